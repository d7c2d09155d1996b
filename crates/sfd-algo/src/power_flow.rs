//! # AC power flow by the Newton-Raphson method
//!
//! Solves the steady-state operating point of a transmission network: given
//! the admittance matrix and the scheduled injections of the bus table, find
//! the voltage magnitude and angle at every bus such that the power balance
//! holds. Every downstream result of the pipeline (branch flows, loss
//! coefficients, dispatch) consumes the operating point produced here.
//!
//! ## Bus classifications
//!
//! ```text
//! ┌────────────┬──────────────────┬──────────────────┐
//! │  BUS TYPE  │  SPECIFIED       │  CALCULATED      │
//! ├────────────┼──────────────────┼──────────────────┤
//! │  SLACK     │  V, δ            │  P, Q            │
//! │  PV        │  P, |V|          │  Q, δ            │
//! │  PQ        │  P, Q            │  |V|, δ          │
//! └────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! ## Formulation
//!
//! Polar mismatch equations on `Y = Yₘ e^{jθ}`:
//!
//! ```text
//! Pᵢ =  Σₖ Vᵢ Vₖ Yᵢₖ cos(θᵢₖ − δᵢ + δₖ)
//! Qᵢ = −Σₖ Vᵢ Vₖ Yᵢₖ sin(θᵢₖ − δᵢ + δₖ)
//! ```
//!
//! The unknown vector stacks one `δ` per non-slack bus followed by one `|V|`
//! per PQ bus, giving `m = 2N − n_pv − 2·n_slack` equations. Each iteration
//! assembles the blocked Jacobian `[∂P/∂δ  ∂P/∂V; ∂Q/∂δ  ∂Q/∂V]` row-by-row
//! from the branches incident to each bus, solves for the correction, and
//! applies it. Convergence is quadratic near the solution; well-conditioned
//! cases settle in 3-6 iterations.
//!
//! A rank-deficient Jacobian (classically: an island with no slack) does not
//! abort the solve; the step falls back to a damped minimum-norm solution and
//! iteration continues, with the outcome reported through `converged`.
//!
//! ## Reactive-limit handling
//!
//! PV buses with a nonzero `qmax` are held inside their reactive capability
//! by a soft setpoint nudge: on iterations 3 through 7, a bus whose implied
//! generator output leaves `[qmin, qmax]` has its magnitude setpoint moved by
//! ±0.01 pu. The window spares the first iterations (wildly wrong Q
//! estimates) and the last (convergence). Buses with `qmax = 0` are exempt.
//!
//! ## References
//!
//! - **Tinney & Hart (1967)**: "Power Flow Solution by Newton's Method"
//!   IEEE Trans. PAS, 86(11), 1449-1460.
//!   DOI: [10.1109/TPAS.1967.291823](https://doi.org/10.1109/TPAS.1967.291823)
//! - **Stott (1974)**: "Review of Load-Flow Calculation Methods"
//!   Proceedings of the IEEE, 62(7), 916-929.
//!   DOI: [10.1109/PROC.1974.9544](https://doi.org/10.1109/PROC.1974.9544)

use crate::linalg;
use num_complex::Complex64;
use serde::Serialize;
use sfd_core::{BusKind, Megavars, Megawatts, NetworkModel, PerUnit, Radians, SfdError, SfdResult};
use tracing::{debug, info, warn};

/// Newton-Raphson solver configuration.
#[derive(Debug, Clone)]
pub struct PowerFlowSolver {
    /// Convergence tolerance on the largest power mismatch (p.u.)
    pub tolerance: f64,
    /// Maximum Newton iterations
    pub max_iterations: usize,
}

impl Default for PowerFlowSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerFlowSolver {
    /// Create a solver with the standard settings (`1e-3`, 10 iterations).
    pub fn new() -> Self {
        Self {
            tolerance: 1e-3,
            max_iterations: 10,
        }
    }

    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Run Newton-Raphson on `ybus` and the model's bus table.
    ///
    /// On return the model's bus table carries the final operating point:
    /// voltage magnitude and angle at every bus, reactive output at the
    /// generator buses, and the slack bus active output. A solve that runs
    /// out of iterations is not an error; it is reported through
    /// [`PowerFlowSolution::converged`] with the best estimate retained.
    pub fn solve(
        &self,
        model: &mut NetworkModel,
        ybus: &[Vec<Complex64>],
    ) -> SfdResult<PowerFlowSolution> {
        let n = model.n_buses();
        if ybus.len() != n || ybus.iter().any(|row| row.len() != n) {
            return Err(SfdError::InvalidInput(format!(
                "admittance matrix must be {n}x{n} to match the bus table"
            )));
        }

        let base_mva = model.base_mva();

        // Unwrap the typed table into flat working arrays.
        let kind: Vec<BusKind> = model.buses().iter().map(|b| b.kind).collect();
        let mut vm: Vec<f64> = model.buses().iter().map(|b| b.voltage.value()).collect();
        let mut delta: Vec<f64> = model.buses().iter().map(|b| b.angle.value()).collect();
        let pd: Vec<f64> = model.buses().iter().map(|b| b.load_p.value()).collect();
        let qd: Vec<f64> = model.buses().iter().map(|b| b.load_q.value()).collect();
        let pg: Vec<f64> = model.buses().iter().map(|b| b.gen_p.value()).collect();
        let qg: Vec<f64> = model.buses().iter().map(|b| b.gen_q.value()).collect();
        let qmin: Vec<f64> = model.buses().iter().map(|b| b.qmin.value()).collect();
        let qmax: Vec<f64> = model.buses().iter().map(|b| b.qmax.value()).collect();
        let qsh: Vec<f64> = model.buses().iter().map(|b| b.shunt_q.value()).collect();

        // Scheduled net injections in per-unit. Slack and PV entries are
        // overwritten with computed values as the iteration proceeds.
        let mut p: Vec<f64> = (0..n).map(|i| (pg[i] - pd[i]) / base_mva).collect();
        let mut q: Vec<f64> = (0..n).map(|i| (qg[i] - qd[i] + qsh[i]) / base_mva).collect();

        // Polar form of the admittance matrix.
        let ym: Vec<Vec<f64>> = ybus
            .iter()
            .map(|row| row.iter().map(|y| y.norm()).collect())
            .collect();
        let th: Vec<Vec<f64>> = ybus
            .iter()
            .map(|row| row.iter().map(|y| y.arg()).collect())
            .collect();

        // Prefix counts of slack/PV buses up to and including each index,
        // and the row/column maps they induce. `p_index` is the P-row (and
        // δ-column) of a non-slack bus; `q_index` the Q-row (and |V|-column)
        // of a PQ bus.
        let ns = 1usize;
        let mut nss = vec![0usize; n];
        let mut ngs = vec![0usize; n];
        let mut slack_seen = 0;
        let mut pv_seen = 0;
        for i in 0..n {
            match kind[i] {
                BusKind::Slack => slack_seen += 1,
                BusKind::PV => pv_seen += 1,
                BusKind::PQ => {}
            }
            nss[i] = slack_seen;
            ngs[i] = pv_seen;
        }
        let ng = pv_seen;
        let m = 2 * n - ng - 2 * ns;

        let p_index: Vec<Option<usize>> = (0..n)
            .map(|i| (kind[i] != BusKind::Slack).then(|| i - nss[i]))
            .collect();
        let q_index: Vec<Option<usize>> = (0..n)
            .map(|i| (kind[i] == BusKind::PQ).then(|| n + i - ngs[i] - nss[i] - ns))
            .collect();

        let mut max_mismatch = if m == 0 { 0.0 } else { 1.0 };
        let mut iterations = 0usize;
        let mut singular_fallbacks = 0usize;
        let mut q_limit_nudges = 0usize;

        while max_mismatch >= self.tolerance && iterations < self.max_iterations {
            iterations += 1;

            let mut a = vec![vec![0.0; m]; m];
            let mut dc = vec![0.0; m];

            for i in 0..n {
                // Accumulate the incident-branch portion of the four diagonal
                // Jacobian blocks while filling the off-diagonal entries.
                let mut j11 = 0.0;
                let mut j22 = 0.0;
                let mut j33 = 0.0;
                let mut j44 = 0.0;

                for branch in model.branches() {
                    let l = if branch.from - 1 == i {
                        branch.to - 1
                    } else if branch.to - 1 == i {
                        branch.from - 1
                    } else {
                        continue;
                    };

                    let ang = th[i][l] - delta[i] + delta[l];
                    j11 += vm[i] * vm[l] * ym[i][l] * ang.sin();
                    j33 += vm[i] * vm[l] * ym[i][l] * ang.cos();

                    if let Some(nn) = p_index[i] {
                        j22 += vm[l] * ym[i][l] * ang.cos();
                        j44 += vm[l] * ym[i][l] * ang.sin();

                        if let Some(ll) = p_index[l] {
                            a[nn][ll] = -vm[i] * vm[l] * ym[i][l] * ang.sin();
                            if let Some(lk) = q_index[l] {
                                a[nn][lk] = vm[i] * ym[i][l] * ang.cos();
                            }
                            if let Some(lm) = q_index[i] {
                                a[lm][ll] = -vm[i] * vm[l] * ym[i][l] * ang.cos();
                                if let Some(lk) = q_index[l] {
                                    a[lm][lk] = -vm[i] * ym[i][l] * ang.sin();
                                }
                            }
                        }
                    }
                }

                let pk = vm[i] * vm[i] * ym[i][i] * th[i][i].cos() + j33;
                let qk = -vm[i] * vm[i] * ym[i][i] * th[i][i].sin() - j11;

                match kind[i] {
                    BusKind::Slack => {
                        // Output only: the slack picks up whatever balances.
                        p[i] = pk;
                        q[i] = qk;
                    }
                    BusKind::PV => {
                        q[i] = qk;
                        // Soft reactive-limit nudge, iterations 3..=7 only.
                        if qmax[i] != 0.0 && (3..=7).contains(&iterations) {
                            let qgc = q[i] * base_mva + qd[i] - qsh[i];
                            if qgc < qmin[i] {
                                vm[i] += 0.01;
                                q_limit_nudges += 1;
                                warn!(
                                    bus = i + 1,
                                    qgc, "below reactive limit, raising voltage setpoint"
                                );
                            } else if qgc > qmax[i] {
                                vm[i] -= 0.01;
                                q_limit_nudges += 1;
                                warn!(
                                    bus = i + 1,
                                    qgc, "above reactive limit, lowering voltage setpoint"
                                );
                            }
                        }
                    }
                    BusKind::PQ => {}
                }

                if let Some(nn) = p_index[i] {
                    a[nn][nn] = j11;
                    dc[nn] = p[i] - pk;

                    if let Some(lm) = q_index[i] {
                        a[nn][lm] = 2.0 * vm[i] * ym[i][i] * th[i][i].cos() + j22;
                        a[lm][nn] = j33;
                        a[lm][lm] = -2.0 * vm[i] * ym[i][i] * th[i][i].sin() - j44;
                        dc[lm] = q[i] - qk;
                    }
                }
            }

            let dx = match linalg::solve_dense(&a, &dc) {
                Ok(dx) => dx,
                Err(_) => {
                    singular_fallbacks += 1;
                    warn!(
                        iteration = iterations,
                        "singular Jacobian, falling back to minimum-norm step"
                    );
                    linalg::solve_damped_min_norm(&a, &dc)
                        .map_err(|e| SfdError::Solver(e.to_string()))?
                }
            };

            for i in 0..n {
                if let Some(nn) = p_index[i] {
                    delta[i] += dx[nn];
                }
                if let Some(lm) = q_index[i] {
                    vm[i] += dx[lm];
                }
            }

            max_mismatch = dc.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
            debug!(iteration = iterations, max_mismatch, "newton step");
        }

        let converged = max_mismatch < self.tolerance;
        let status = if converged {
            "Newton-Raphson power flow converged".to_string()
        } else {
            format!(
                "Newton-Raphson power flow did not converge after {iterations} iterations \
                 (max mismatch {max_mismatch:.3e})"
            )
        };
        if converged {
            info!(iterations, max_mismatch, "power flow converged");
        } else {
            warn!(iterations, max_mismatch, "power flow did not converge");
        }

        // Post-processing: final injections from the converged voltages.
        // Slack takes both computed injections, PV buses the reactive one,
        // PQ buses keep their schedule.
        for i in 0..n {
            if kind[i] == BusKind::PQ {
                continue;
            }
            let mut pk = 0.0;
            let mut qk = 0.0;
            for k in 0..n {
                let ang = th[i][k] - delta[i] + delta[k];
                pk += vm[i] * vm[k] * ym[i][k] * ang.cos();
                qk -= vm[i] * vm[k] * ym[i][k] * ang.sin();
            }
            if kind[i] == BusKind::Slack {
                p[i] = pk;
            }
            q[i] = qk;
        }

        let voltage: Vec<Complex64> = (0..n)
            .map(|i| Complex64::from_polar(vm[i], delta[i]))
            .collect();
        let power: Vec<Complex64> = (0..n).map(|i| Complex64::new(p[i], q[i])).collect();

        // Equivalent constant-impedance load admittance at every bus, for
        // collaborators that model loads as shunts at the solved voltage.
        let load_admittance: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new(pd[i], qsh[i] - qd[i]) / (base_mva * vm[i] * vm[i]))
            .collect();

        let mut generator_numbers = Vec::new();
        let mut generator_p_mw = Vec::new();
        let mut generator_q_mvar = Vec::new();
        let mut pg_out = pg.clone();
        let mut qg_out = qg.clone();
        for i in 0..n {
            match kind[i] {
                BusKind::Slack => {
                    pg_out[i] = p[i] * base_mva + pd[i];
                    qg_out[i] = q[i] * base_mva + qd[i] - qsh[i];
                }
                BusKind::PV => {
                    qg_out[i] = q[i] * base_mva + qd[i] - qsh[i];
                }
                BusKind::PQ => continue,
            }
            generator_numbers.push(i + 1);
            generator_p_mw.push(pg_out[i]);
            generator_q_mvar.push(qg_out[i]);
        }

        // Re-sync the bus table with the solved operating point.
        for (i, bus) in model.buses_mut().iter_mut().enumerate() {
            bus.voltage = PerUnit(vm[i]);
            bus.angle = Radians(delta[i]);
            if bus.kind.is_generator() {
                bus.gen_p = Megawatts(pg_out[i]);
                bus.gen_q = Megavars(qg_out[i]);
            }
        }

        Ok(PowerFlowSolution {
            converged,
            iterations,
            max_mismatch,
            status,
            voltage_magnitude: vm,
            voltage_angle_deg: delta.iter().map(|d| d.to_degrees()).collect(),
            voltage,
            p_injection: p,
            q_injection: q,
            power,
            load_admittance,
            generator_numbers,
            generator_p_mw,
            generator_q_mvar,
            singular_fallbacks,
            q_limit_nudges,
        })
    }
}

/// Converged (or best-estimate) operating point. All per-bus vectors are
/// indexed by internal bus index, i.e. entry `k` belongs to bus `k + 1`.
#[derive(Debug, Clone, Serialize)]
pub struct PowerFlowSolution {
    /// Did the solver meet the mismatch tolerance?
    pub converged: bool,
    /// Number of Newton iterations performed
    pub iterations: usize,
    /// Largest power mismatch at exit (p.u.)
    pub max_mismatch: f64,
    /// Human-readable outcome
    pub status: String,
    /// Voltage magnitudes (p.u.)
    pub voltage_magnitude: Vec<f64>,
    /// Voltage angles (degrees)
    pub voltage_angle_deg: Vec<f64>,
    /// Voltage phasors (p.u.)
    pub voltage: Vec<Complex64>,
    /// Net active injections (p.u.)
    pub p_injection: Vec<f64>,
    /// Net reactive injections (p.u.)
    pub q_injection: Vec<f64>,
    /// Net complex injections `S = P + jQ` (p.u.)
    pub power: Vec<Complex64>,
    /// Equivalent constant-impedance load admittance at each bus (p.u.)
    pub load_admittance: Vec<Complex64>,
    /// 1-based numbers of the generator buses (slack + PV), in bus order
    pub generator_numbers: Vec<usize>,
    /// Generator active output (MW), aligned with `generator_numbers`
    pub generator_p_mw: Vec<f64>,
    /// Generator reactive output (Mvar), aligned with `generator_numbers`
    pub generator_q_mvar: Vec<f64>,
    /// Newton steps that required the minimum-norm fallback
    pub singular_fallbacks: usize,
    /// Reactive-limit voltage nudges applied to PV buses
    pub q_limit_nudges: usize,
}

impl PowerFlowSolution {
    /// Total generator output `(MW, Mvar)` including the slack bus.
    pub fn total_generation(&self) -> (f64, f64) {
        (
            self.generator_p_mw.iter().sum(),
            self.generator_q_mvar.iter().sum(),
        )
    }
}
