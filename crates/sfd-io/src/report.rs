//! Plain-text result tables.
//!
//! The formatting here is deliberately dumb: fixed-width columns returned as
//! a `String`, so the caller decides where the text goes (stdout, a log, a
//! file). Nothing in the numerical pipeline prints.

use sfd_algo::flows::FlowReport;
use sfd_algo::power_flow::PowerFlowSolution;
use sfd_core::NetworkModel;
use std::fmt::Write;

/// Bus solution table: voltage, angle, load, generation, shunt injection,
/// with a totals row.
pub fn bus_report(model: &NetworkModel, solution: &PowerFlowSolution) -> String {
    let mut out = String::new();

    writeln!(out, "{}", solution.status).unwrap();
    writeln!(
        out,
        "Maximum power mismatch = {:.6e} p.u. after {} iteration(s)",
        solution.max_mismatch, solution.iterations
    )
    .unwrap();
    writeln!(out).unwrap();
    writeln!(
        out,
        "Bus   Kind   Voltage   Angle     ----Load----------    ----Generation----   Injected"
    )
    .unwrap();
    writeln!(
        out,
        "No.          (p.u.)    (deg)     (MW)      (Mvar)       (MW)      (Mvar)     (Mvar)"
    )
    .unwrap();
    writeln!(out, "{}", "=".repeat(88)).unwrap();

    for (i, bus) in model.buses().iter().enumerate() {
        writeln!(
            out,
            "{:<5} {:<6} {:>7.3} {:>8.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            bus.number,
            bus.kind.to_string(),
            solution.voltage_magnitude[i],
            solution.voltage_angle_deg[i],
            bus.load_p.value(),
            bus.load_q.value(),
            bus.gen_p.value(),
            bus.gen_q.value(),
            bus.shunt_q.value(),
        )
        .unwrap();
    }

    let (pd, qd) = model.total_load();
    let (pg, qg) = model.total_generation();
    let qsh = model.total_shunt();
    writeln!(out, "{}", "-".repeat(88)).unwrap();
    writeln!(
        out,
        "Total                          {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
        pd.value(),
        qd.value(),
        pg.value(),
        qg.value(),
        qsh.value(),
    )
    .unwrap();

    out
}

/// Branch flow and loss table with a total-loss row.
pub fn flow_report(report: &FlowReport) -> String {
    let mut out = String::new();

    writeln!(out, "Line flows and losses").unwrap();
    writeln!(out).unwrap();
    writeln!(
        out,
        "--Line--   ---Sending end-----------     ---Receiving end---    ----Loss--------  Tap"
    )
    .unwrap();
    writeln!(
        out,
        "from  to     (MW)     (Mvar)    (MVA)       (MW)     (Mvar)       (MW)    (Mvar)"
    )
    .unwrap();
    writeln!(out, "{}", "=".repeat(92)).unwrap();

    for flow in &report.branches {
        write!(
            out,
            "{:<5} {:<4} {:>8.3} {:>9.3} {:>9.3} {:>10.3} {:>9.3} {:>10.3} {:>9.3}",
            flow.from,
            flow.to,
            flow.from_flow_mva.re,
            flow.from_flow_mva.im,
            flow.from_flow_mva.norm(),
            flow.to_flow_mva.re,
            flow.to_flow_mva.im,
            flow.loss_mva.re,
            flow.loss_mva.im,
        )
        .unwrap();
        if (flow.tap - 1.0).abs() > 1e-9 {
            writeln!(out, "  {:>6.3}", flow.tap).unwrap();
        } else {
            writeln!(out).unwrap();
        }
    }

    writeln!(out, "{}", "-".repeat(92)).unwrap();
    writeln!(
        out,
        "Total loss{:>53.3} {:>9.3}",
        report.total_loss_mva.re, report.total_loss_mva.im
    )
    .unwrap();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfd_algo::{admittance::build_ybus, flows::branch_flows, power_flow::PowerFlowSolver};
    use sfd_core::{Branch, Bus, BusKind, NetworkModel};

    fn solved_case() -> (NetworkModel, PowerFlowSolution) {
        let mut model = NetworkModel::new(
            vec![
                Bus::new(1, BusKind::Slack).with_voltage(1.05),
                Bus::new(2, BusKind::PQ).with_load(100.0, 50.0),
            ],
            vec![Branch::new(1, 2, 0.02, 0.04)],
        )
        .unwrap();
        let ybus = build_ybus(&model).unwrap();
        let solution = PowerFlowSolver::new().solve(&mut model, &ybus).unwrap();
        (model, solution)
    }

    #[test]
    fn test_bus_report_contents() {
        let (model, solution) = solved_case();
        let text = bus_report(&model, &solution);
        assert!(text.contains("converged"));
        assert!(text.contains("Slack"));
        assert!(text.contains("100.000"));
        assert!(text.contains("Total"));
    }

    #[test]
    fn test_flow_report_contents() {
        let (model, solution) = solved_case();
        let report = branch_flows(&model, &solution);
        let text = flow_report(&report);
        assert!(text.contains("Line flows and losses"));
        assert!(text.contains("Total loss"));
        // One data row for the single branch.
        let data_rows = text
            .lines()
            .filter(|l| l.split_whitespace().next() == Some("1"))
            .count();
        assert_eq!(data_rows, 1);
    }
}
