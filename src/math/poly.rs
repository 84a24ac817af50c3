//! Polynomial least-squares fitting and evaluation.
//!
//! Coefficients are stored highest power first, matching the usual
//! `polyfit`/`polyval` convention, so `coeffs = [a, b, c]` means
//! `a x^2 + b x + c`.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// Fit a degree-`degree` polynomial to `(x, y)` pairs by least squares.
///
/// Returns `None` when there are fewer points than coefficients or the
/// Vandermonde system is too ill-conditioned.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = xs.len();
    let p = degree + 1;
    if n < p || n != ys.len() {
        return None;
    }

    let mut design = DMatrix::<f64>::zeros(n, p);
    for (i, &x) in xs.iter().enumerate() {
        // Row: [x^degree, ..., x, 1]
        let mut pow = 1.0;
        for j in (0..p).rev() {
            design[(i, j)] = pow;
            pow *= x;
        }
    }
    let y = DVector::from_row_slice(ys);

    let beta = solve_least_squares(&design, &y)?;
    Some(beta.iter().copied().collect())
}

/// Evaluate a highest-power-first polynomial at `x` (Horner's method).
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
}
