//! Dense linear-algebra kernels shared by the solver stages.
//!
//! Matrices are plain row-major `Vec<Vec<_>>`; the systems solved here are
//! small enough (a few hundred rows at most) that dense factorization wins on
//! simplicity. Real systems go through faer's partially pivoted LU. When a
//! Jacobian goes rank-deficient mid-iteration the solver does not abort: it
//! falls back to [`solve_damped_min_norm`], a Tikhonov-damped normal-equations
//! solve that returns the minimum-norm step and lets the iteration continue.

use anyhow::{anyhow, Result};
use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};
use num_complex::Complex64;

/// Solve `A x = b` using faer's LU decomposition with partial pivoting.
///
/// Fails when the matrix is singular (detected through a non-finite
/// solution).
pub fn solve_dense(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    if n == 0 {
        return Ok(vec![]);
    }

    let mut mat = Mat::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            mat.write(i, j, a[i][j]);
        }
    }

    let mut rhs = Mat::zeros(n, 1);
    for i in 0..n {
        rhs.write(i, 0, b[i]);
    }

    let lu = mat.partial_piv_lu();
    let solution = lu.solve(&rhs);

    let x: Vec<f64> = (0..n).map(|i| solution.read(i, 0)).collect();

    if x.iter().any(|&v| !v.is_finite()) {
        return Err(anyhow!("singular matrix in LU solve"));
    }

    Ok(x)
}

/// Minimum-norm least-squares solve of `A x = b` for a rank-deficient `A`.
///
/// Forms the damped normal equations `(AᵀA + εI) x = Aᵀb` with `ε` scaled to
/// the magnitude of `AᵀA`, which is always nonsingular and agrees with the
/// pseudo-inverse solution up to the damping.
pub fn solve_damped_min_norm(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    if n == 0 {
        return Ok(vec![]);
    }

    let mut ata = vec![vec![0.0; n]; n];
    let mut atb = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..n {
                sum += a[k][i] * a[k][j];
            }
            ata[i][j] = sum;
        }
        let mut sum = 0.0;
        for k in 0..n {
            sum += a[k][i] * b[k];
        }
        atb[i] = sum;
    }

    let scale = ata
        .iter()
        .enumerate()
        .map(|(i, row)| row[i].abs())
        .fold(0.0_f64, f64::max);
    let eps = 1e-8 * (1.0 + scale);
    for (i, row) in ata.iter_mut().enumerate() {
        row[i] += eps;
    }

    solve_dense(&ata, &atb)
}

/// Invert a dense complex matrix by Gauss-Jordan elimination with partial
/// pivoting.
pub fn invert_complex(a: &[Vec<Complex64>]) -> Result<Vec<Vec<Complex64>>> {
    let n = a.len();
    if n == 0 {
        return Ok(vec![]);
    }

    // Augmented [A | I], reduced in place.
    let mut aug: Vec<Vec<Complex64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != n {
                return Vec::new();
            }
            let mut r = row.clone();
            r.extend((0..n).map(|j| {
                if i == j {
                    Complex64::new(1.0, 0.0)
                } else {
                    Complex64::new(0.0, 0.0)
                }
            }));
            r
        })
        .collect();
    if aug.iter().any(|r| r.len() != 2 * n) {
        return Err(anyhow!("matrix is not square"));
    }

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].norm();
        for row in (col + 1)..n {
            if aug[row][col].norm() > max_val {
                max_val = aug[row][col].norm();
                max_row = row;
            }
        }

        if max_val < 1e-12 {
            return Err(anyhow!("singular matrix in complex inversion"));
        }

        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for j in 0..2 * n {
            aug[col][j] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor.norm() == 0.0 {
                continue;
            }
            for j in 0..2 * n {
                let v = aug[col][j];
                aug[row][j] -= factor * v;
            }
        }
    }

    Ok(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}
