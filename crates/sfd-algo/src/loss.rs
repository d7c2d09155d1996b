//! Loss formula (B-coefficient) derivation from a converged base case.
//!
//! Kron's loss formula approximates total system real loss as a quadratic
//! form in the generator active outputs `Pg` (MW):
//!
//! ```text
//! PL = Pgᵀ·(B/Sbase)·Pg + B₀ᵀ·Pg + B₀₀·Sbase     (MW)
//! ```
//!
//! The derivation transforms the network's open-circuit impedance matrix
//! `Zbus = Ybus⁻¹` through the load current distribution observed in the
//! base case: loads are assumed to draw currents in fixed ratio (conformal
//! loading) and each generator to hold its base-case power factor. The
//! formula is therefore exact at the base operating point and a good
//! approximation for moderate redispatch around it, which is all economic
//! dispatch needs.
//!
//! The matrix `B` is symmetric positive semi-definite by construction (it is
//! a congruence transform of `Re(Zbus)`).
//!
//! ## References
//!
//! - **Kron (1952)**: "Tensorial Analysis of Integrated Transmission
//!   Systems - Part III", AIEE Trans., 71(1), 814-822.
//! - **Kirchmayer (1958)**: *Economic Operation of Power Systems*, Wiley.

use crate::linalg;
use crate::power_flow::PowerFlowSolution;
use num_complex::Complex64;
use serde::Serialize;
use sfd_core::{NetworkModel, SfdError, SfdResult};

/// Loss-formula coefficients for the generator set of a case.
///
/// `b` is `g x g`, `b0` has length `g`, where `g` is the number of generator
/// buses (slack + PV) in bus order; `b00` is the constant term.
#[derive(Debug, Clone, Serialize)]
pub struct LossCoefficients {
    pub b: Vec<Vec<f64>>,
    pub b0: Vec<f64>,
    pub b00: f64,
}

impl LossCoefficients {
    /// The all-zero (lossless) coefficients for `g` generators.
    pub fn zero(g: usize) -> Self {
        Self {
            b: vec![vec![0.0; g]; g],
            b0: vec![0.0; g],
            b00: 0.0,
        }
    }

    /// Number of generators the coefficients describe.
    pub fn order(&self) -> usize {
        self.b0.len()
    }

    /// Evaluate the loss formula at a generation vector (MW in, MW out).
    pub fn system_loss_mw(&self, pg_mw: &[f64], base_mva: f64) -> f64 {
        let g = self.order();
        let mut quadratic = 0.0;
        for k in 0..g {
            for m in 0..g {
                quadratic += pg_mw[k] * self.b[k][m] * pg_mw[m];
            }
        }
        let linear: f64 = (0..g).map(|k| self.b0[k] * pg_mw[k]).sum();
        quadratic / base_mva + linear + self.b00 * base_mva
    }
}

/// Derive `(B, B₀, B₀₀)` from a converged power-flow base case.
///
/// The model must carry the solved operating point (generator outputs synced
/// by the solver) and `ybus` must be the matrix the case was solved with.
pub fn kron_loss_coefficients(
    model: &NetworkModel,
    ybus: &[Vec<Complex64>],
    solution: &PowerFlowSolution,
) -> SfdResult<LossCoefficients> {
    let n = model.n_buses();
    if !solution.converged {
        return Err(SfdError::Solver(
            "loss coefficients require a converged base case".into(),
        ));
    }
    if ybus.len() != n {
        return Err(SfdError::InvalidInput(
            "admittance matrix does not match the bus table".into(),
        ));
    }

    let base_mva = model.base_mva();
    let zbus = linalg::invert_complex(ybus).map_err(|e| SfdError::Solver(e.to_string()))?;

    let v = &solution.voltage;
    let gens = model.generator_indices();
    let g = gens.len();
    let ks = model.slack_index();

    // Load currents at the base point and their distribution factors.
    let currents: Vec<Complex64> = model
        .buses()
        .iter()
        .enumerate()
        .map(|(k, bus)| {
            -Complex64::new(bus.load_p.value(), -bus.load_q.value()) / (base_mva * v[k].conj())
        })
        .collect();
    let total_current: Complex64 = currents.iter().sum();
    if total_current.norm() < 1e-12 {
        return Err(SfdError::Solver(
            "loss coefficients are undefined for a case without load current".into(),
        ));
    }
    let d1: Vec<Complex64> = currents.iter().map(|i| i / total_current).collect();

    let dd: Complex64 = (0..n).map(|k| d1[k] * zbus[ks][k]).sum();
    let t1: Vec<Complex64> = gens.iter().map(|&k| zbus[ks][k] / dd).collect();

    // C1 (n x g+1): one-hot generator selector columns next to the load
    // distribution column. C2 (g+1 x g+1): identity over -t1ᵀ, with the
    // closing column (0,...,0,-t1[0])ᵀ.
    let zero = Complex64::new(0.0, 0.0);
    let mut c1 = vec![vec![zero; g + 1]; n];
    for (j, &k) in gens.iter().enumerate() {
        c1[k][j] = Complex64::new(1.0, 0.0);
    }
    for k in 0..n {
        c1[k][g] = d1[k];
    }

    let mut c2 = vec![vec![zero; g + 1]; g + 1];
    for j in 0..g {
        c2[j][j] = Complex64::new(1.0, 0.0);
        c2[g][j] = -t1[j];
    }
    c2[g][g] = -t1[0];

    // C = C1 · C2  (n x g+1)
    let mut c = vec![vec![zero; g + 1]; n];
    for i in 0..n {
        for j in 0..=g {
            let mut sum = zero;
            for k in 0..=g {
                sum += c1[i][k] * c2[k][j];
            }
            c[i][j] = sum;
        }
    }

    // Diagonal scaling: each generator contributes at its base-case power
    // factor, the slack through its Thevenin column.
    let mut alpha = vec![zero; g + 1];
    for (j, &k) in gens.iter().enumerate() {
        let bus = &model.buses()[k];
        let pg = bus.gen_p.value();
        alpha[j] = if pg > 1e-6 {
            Complex64::new(1.0, -(bus.gen_q.value() + bus.shunt_q.value()) / pg) / v[k].conj()
        } else {
            Complex64::new(1.0, 0.0) / v[k].conj()
        };
    }
    alpha[g] = -v[ks] / zbus[ks][ks];

    // T = A · Cᴴ · Re(Zbus) · conj(C) · conj(A), then hermitize elementwise:
    // BB = ½(T + conj(T)). M1 below is the inner congruence product.
    let mut m1 = vec![vec![zero; g + 1]; g + 1];
    for p in 0..=g {
        for q in 0..=g {
            let mut sum = zero;
            for i in 0..n {
                let mut row = zero;
                for j in 0..n {
                    row += zbus[i][j].re * c[j][q].conj();
                }
                sum += c[i][p].conj() * row;
            }
            m1[p][q] = sum;
        }
    }

    let mut bb = vec![vec![zero; g + 1]; g + 1];
    for p in 0..=g {
        for q in 0..=g {
            let t = alpha[p] * m1[p][q] * alpha[q].conj();
            bb[p][q] = 0.5 * (t + t.conj());
        }
    }

    let mut b = vec![vec![0.0; g]; g];
    let mut b0 = vec![0.0; g];
    for k in 0..g {
        for m in 0..g {
            b[k][m] = bb[k][m].re;
        }
        b0[k] = 2.0 * bb[g][k].re;
    }
    let b00 = bb[g][g].re;

    Ok(LossCoefficients { b, b0, b00 })
}
