//! Numeric table records for case ingestion.
//!
//! A case arrives as two flat numeric tables:
//!
//! - **bus rows** (11 columns):
//!   `number, kind, vm, delta_deg, pd_mw, qd_mvar, pg_mw, qg_mvar,
//!   qmin_mvar, qmax_mvar, qsh_mvar`
//! - **branch rows** (6 columns):
//!   `from, to, r_pu, x_pu, bc_pu, tap`
//!
//! `kind` uses the conventional encoding `1 = slack, 2 = PV, 0 = PQ`; angles
//! are in degrees, powers in MW/Mvar, impedances in per-unit. The records are
//! plain serde structs so they can come from CSV, JSON, or be written
//! inline; [`build_network`] converts and validates a pair of tables into a
//! [`NetworkModel`].

use serde::{Deserialize, Serialize};
use sfd_core::{is_connected, Branch, Bus, BusKind, Degrees, NetworkModel, SfdResult};
use tracing::warn;

/// One row of the bus table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusRecord {
    /// 1-based bus number
    pub number: usize,
    /// Bus kind code: `1` slack, `2` PV, `0` PQ
    pub kind: i64,
    /// Voltage magnitude guess (p.u.); non-positive means flat start
    pub vm: f64,
    /// Voltage angle guess (degrees)
    pub delta_deg: f64,
    /// Active load (MW)
    pub pd_mw: f64,
    /// Reactive load (Mvar)
    pub qd_mvar: f64,
    /// Scheduled active generation (MW)
    pub pg_mw: f64,
    /// Scheduled reactive generation (Mvar)
    pub qg_mvar: f64,
    /// Lower reactive limit (Mvar)
    pub qmin_mvar: f64,
    /// Upper reactive limit (Mvar); `0` disables enforcement
    pub qmax_mvar: f64,
    /// Shunt reactive injection (Mvar)
    pub qsh_mvar: f64,
}

impl BusRecord {
    /// Convert the row into a typed [`Bus`].
    pub fn into_bus(self) -> SfdResult<Bus> {
        let kind = BusKind::from_code(self.kind)?;
        Ok(Bus::new(self.number, kind)
            .with_voltage(self.vm)
            .with_angle(Degrees(self.delta_deg))
            .with_load(self.pd_mw, self.qd_mvar)
            .with_generation(self.pg_mw, self.qg_mvar)
            .with_q_limits(self.qmin_mvar, self.qmax_mvar)
            .with_shunt(self.qsh_mvar))
    }
}

/// One row of the branch table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRecord {
    /// 1-based sending-end bus (tap side)
    pub from: usize,
    /// 1-based receiving-end bus
    pub to: usize,
    /// Series resistance (p.u.)
    pub r_pu: f64,
    /// Series reactance (p.u.)
    pub x_pu: f64,
    /// Per-end line-charging susceptance (p.u.)
    pub bc_pu: f64,
    /// Off-nominal tap ratio; non-positive is treated as `1.0`
    pub tap: f64,
}

impl BranchRecord {
    /// Convert the row into a typed [`Branch`].
    pub fn into_branch(self) -> Branch {
        Branch::new(self.from, self.to, self.r_pu, self.x_pu)
            .with_charging(self.bc_pu)
            .with_tap(self.tap)
    }
}

/// Convert and validate a pair of tables into a [`NetworkModel`].
///
/// All structural checks of [`NetworkModel::new`] apply (dense numbering,
/// single slack, sane branches). A disconnected case is accepted but
/// produces a warning, since the Newton solve cannot converge on islands
/// without a slack.
pub fn build_network(
    bus_rows: Vec<BusRecord>,
    branch_rows: Vec<BranchRecord>,
) -> SfdResult<NetworkModel> {
    let buses = bus_rows
        .into_iter()
        .map(BusRecord::into_bus)
        .collect::<SfdResult<Vec<_>>>()?;
    let branches = branch_rows
        .into_iter()
        .map(BranchRecord::into_branch)
        .collect();

    let model = NetworkModel::new(buses, branches)?;
    if !is_connected(&model) {
        warn!(
            buses = model.n_buses(),
            "case is not a single electrical island; the power flow will not converge"
        );
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfd_core::SfdError;

    fn bus_row(number: usize, kind: i64) -> BusRecord {
        BusRecord {
            number,
            kind,
            vm: 1.0,
            delta_deg: 0.0,
            pd_mw: 0.0,
            qd_mvar: 0.0,
            pg_mw: 0.0,
            qg_mvar: 0.0,
            qmin_mvar: 0.0,
            qmax_mvar: 0.0,
            qsh_mvar: 0.0,
        }
    }

    fn branch_row(from: usize, to: usize) -> BranchRecord {
        BranchRecord {
            from,
            to,
            r_pu: 0.01,
            x_pu: 0.1,
            bc_pu: 0.0,
            tap: 1.0,
        }
    }

    #[test]
    fn test_build_network() {
        let model = build_network(
            vec![bus_row(1, 1), bus_row(2, 0)],
            vec![branch_row(1, 2)],
        )
        .unwrap();
        assert_eq!(model.n_buses(), 2);
        assert_eq!(model.buses()[0].kind, BusKind::Slack);
    }

    #[test]
    fn test_bad_kind_code() {
        let err = build_network(vec![bus_row(1, 1), bus_row(2, 3)], vec![branch_row(1, 2)])
            .unwrap_err();
        assert!(matches!(err, SfdError::InvalidInput(_)));
        assert!(err.to_string().contains("kind code 3"));
    }

    #[test]
    fn test_degrees_converted() {
        let mut row = bus_row(1, 1);
        row.delta_deg = 90.0;
        let bus = row.into_bus().unwrap();
        assert!((bus.angle.value() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_flat_start_from_zero_vm() {
        let mut slack = bus_row(1, 1);
        slack.vm = 1.05;
        let mut pq = bus_row(2, 0);
        pq.vm = 0.0;
        pq.delta_deg = 45.0;
        let model = build_network(vec![slack, pq], vec![branch_row(1, 2)]).unwrap();
        assert_eq!(model.buses()[1].voltage.value(), 1.0);
        assert_eq!(model.buses()[1].angle.value(), 0.0);
    }

    #[test]
    fn test_tap_normalized() {
        let mut br = branch_row(1, 2);
        br.tap = 0.0;
        let model = build_network(vec![bus_row(1, 1), bus_row(2, 0)], vec![br]).unwrap();
        assert_eq!(model.branches()[0].tap, 1.0);
    }
}
