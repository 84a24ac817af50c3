//! Linear least squares solver.
//!
//! Both the background polynomial and the energy/activity calibration lines
//! reduce to small linear regression problems of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We use SVD to solve the least-squares problem robustly even when the
//!   design matrix is tall (thousands of channel rows, 2–3 columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Vandermonde columns over a long channel axis are badly scaled, so we try
//!   progressively looser singular-value tolerances before giving up.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_overdetermined_noise_free() {
        // y = 1 + 2x + 3x^2 on six points; exact recovery expected.
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let mut rows = Vec::new();
        let mut ys = Vec::new();
        for &x in &xs {
            rows.extend_from_slice(&[1.0, x, x * x]);
            ys.push(1.0 + 2.0 * x + 3.0 * x * x);
        }
        let x = DMatrix::from_row_slice(6, 3, &rows);
        let y = DVector::from_row_slice(&ys);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-8);
        assert!((beta[1] - 2.0).abs() < 1e-8);
        assert!((beta[2] - 3.0).abs() < 1e-8);
    }
}
