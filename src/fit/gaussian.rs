//! Sum-of-Gaussians model for the multi-peak fit.
//!
//! Parameters are a flat vector of `(amplitude, mean, variance)` triples, one
//! per peak, fitted jointly. Seeds are fixed values rather than being derived
//! from the candidate's measured width; this mirrors the lab's historical
//! procedure and is a documented simplification, not an oversight.

use nalgebra::{DMatrix, DVector};

use crate::math::LmProblem;

/// Fixed amplitude seed for every component.
pub const AMPLITUDE_SEED: f64 = 1000.0;
/// Fixed variance seed for every component.
pub const VARIANCE_SEED: f64 = 100.0;

/// Evaluate the Gaussian sum at `x` for a flat `(amp, mean, var)*` vector.
pub fn gaussian_sum(params: &[f64], x: f64) -> f64 {
    debug_assert!(params.len() % 3 == 0);
    params
        .chunks_exact(3)
        .map(|p| {
            let d = x - p[1];
            p[0] * (-d * d / (2.0 * p[2])).exp()
        })
        .sum()
}

/// Least-squares problem: background-flattened counts vs. the Gaussian sum.
pub struct GaussianSumProblem<'a> {
    /// Channel positions.
    pub xs: &'a [f64],
    /// Background-subtracted counts (may be negative).
    pub ys: &'a [f64],
}

impl LmProblem for GaussianSumProblem<'_> {
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = params.as_slice();
        DVector::from_iterator(
            self.xs.len(),
            self.xs
                .iter()
                .zip(self.ys.iter())
                .map(|(&x, &y)| y - gaussian_sum(p, x)),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let n = self.xs.len();
        let p = params.as_slice();
        let mut jac = DMatrix::zeros(n, p.len());

        for (i, &x) in self.xs.iter().enumerate() {
            for (k, comp) in p.chunks_exact(3).enumerate() {
                let (amp, mean, var) = (comp[0], comp[1], comp[2]);
                let d = x - mean;
                let e = (-d * d / (2.0 * var)).exp();

                // Residual is y - model, hence the negated model derivatives.
                jac[(i, 3 * k)] = -e;
                jac[(i, 3 * k + 1)] = -amp * e * d / var;
                jac[(i, 3 * k + 2)] = -amp * e * d * d / (2.0 * var * var);
            }
        }

        jac
    }
}
