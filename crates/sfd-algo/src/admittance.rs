//! Bus admittance matrix assembly.
//!
//! Builds the dense complex nodal admittance matrix `Ybus` from the branch
//! table. For a branch with series admittance `y = 1/(R + jX)`, per-end
//! charging susceptance `Bc`, and off-nominal tap `a` on the `from` side:
//!
//! ```text
//! Y[f][t] = Y[t][f] -= y / a
//! Y[f][f] += y / a² + jBc
//! Y[t][t] += y     + jBc
//! ```
//!
//! Off-diagonals therefore stay symmetric even for transformer branches; only
//! the two diagonal contributions differ when `a != 1`. The stored `Bc` is
//! the per-end quantity, so it is added whole to each diagonal. `Ybus`
//! depends only on the branch table and is rebuilt whenever topology or
//! branch parameters change.

use num_complex::{Complex64, ComplexFloat};
use sfd_core::{NetworkModel, SfdError, SfdResult};

/// Assemble the dense `N x N` nodal admittance matrix.
///
/// Branch order does not affect the result. A branch with (numerically) zero
/// series impedance has no finite admittance and is rejected.
pub fn build_ybus(model: &NetworkModel) -> SfdResult<Vec<Vec<Complex64>>> {
    let n = model.n_buses();
    let mut ybus = vec![vec![Complex64::new(0.0, 0.0); n]; n];

    for branch in model.branches() {
        let f = branch.from - 1;
        let t = branch.to - 1;

        let z = Complex64::new(branch.resistance, branch.reactance);
        if z.norm_sqr() < 1e-12 {
            return Err(SfdError::InvalidInput(format!(
                "branch {}-{} has (near-)zero series impedance",
                branch.from, branch.to
            )));
        }
        let y = z.recip();

        let tap = if branch.tap > 0.0 { branch.tap } else { 1.0 };
        let charging = Complex64::new(0.0, branch.charging);

        let y_off = y / tap;
        ybus[f][t] -= y_off;
        let mirrored = ybus[f][t];
        ybus[t][f] = mirrored;

        ybus[f][f] += y / (tap * tap) + charging;
        ybus[t][t] += y + charging;
    }

    Ok(ybus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfd_core::{Branch, Bus, BusKind, NetworkModel};

    fn radial_model(branches: Vec<Branch>, n: usize) -> NetworkModel {
        let mut buses = vec![Bus::new(1, BusKind::Slack)];
        for k in 2..=n {
            buses.push(Bus::new(k, BusKind::PQ));
        }
        NetworkModel::new(buses, branches).unwrap()
    }

    #[test]
    fn test_symmetry() {
        let model = radial_model(
            vec![
                Branch::new(1, 2, 0.02, 0.06).with_charging(0.03),
                Branch::new(2, 3, 0.01, 0.03),
                Branch::new(1, 3, 0.05, 0.25).with_tap(0.95),
            ],
            3,
        );
        let ybus = build_ybus(&model).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (ybus[i][j] - ybus[j][i]).norm() < 1e-12,
                    "Ybus[{i}][{j}] != Ybus[{j}][{i}]"
                );
            }
        }
    }

    #[test]
    fn test_row_sum_lossless_radial() {
        // Pure series line with no shunt: every row must sum to zero.
        let model = radial_model(vec![Branch::new(1, 2, 0.0, 0.25)], 2);
        let ybus = build_ybus(&model).unwrap();
        for i in 0..2 {
            let sum: Complex64 = ybus[i].iter().sum();
            assert!(sum.norm() < 1e-12, "row {i} sums to {sum}");
        }
    }

    #[test]
    fn test_series_values() {
        let model = radial_model(vec![Branch::new(1, 2, 0.02, 0.04)], 2);
        let ybus = build_ybus(&model).unwrap();
        let y = Complex64::new(0.02, 0.04).recip();
        assert!((ybus[0][0] - y).norm() < 1e-12);
        assert!((ybus[0][1] + y).norm() < 1e-12);
    }

    #[test]
    fn test_tap_breaks_diagonal_only() {
        let a = 0.95;
        let model = radial_model(vec![Branch::new(1, 2, 0.0, 0.2).with_tap(a)], 2);
        let ybus = build_ybus(&model).unwrap();
        let y = Complex64::new(0.0, 0.2).recip();
        assert!((ybus[0][1] + y / a).norm() < 1e-12);
        assert!((ybus[1][0] + y / a).norm() < 1e-12);
        assert!((ybus[0][0] - y / (a * a)).norm() < 1e-12);
        assert!((ybus[1][1] - y).norm() < 1e-12);
    }

    #[test]
    fn test_charging_added_per_end() {
        let bc = 0.05;
        let model = radial_model(vec![Branch::new(1, 2, 0.0, 0.5).with_charging(bc)], 2);
        let ybus = build_ybus(&model).unwrap();
        let y = Complex64::new(0.0, 0.5).recip();
        assert!((ybus[0][0] - (y + Complex64::new(0.0, bc))).norm() < 1e-12);
        assert!((ybus[1][1] - (y + Complex64::new(0.0, bc))).norm() < 1e-12);
    }

    #[test]
    fn test_parallel_branches_accumulate() {
        let model = radial_model(
            vec![Branch::new(1, 2, 0.0, 0.2), Branch::new(1, 2, 0.0, 0.2)],
            2,
        );
        let ybus = build_ybus(&model).unwrap();
        let y = Complex64::new(0.0, 0.2).recip();
        assert!((ybus[0][1] + 2.0 * y).norm() < 1e-12);
        assert!((ybus[1][0] + 2.0 * y).norm() < 1e-12);
    }
}
