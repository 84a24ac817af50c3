//! Delay-coincidence decay fit for the BiPo exercise.
//!
//! The coincidence rate as a function of the delay-gate setting follows
//! `rate(t) = offset + scale * exp(-lambda * t)`; the half-life of the
//! intermediate state is `ln 2 / lambda`.

use nalgebra::{DMatrix, DVector};

use crate::domain::DecayFit;
use crate::error::AppError;
use crate::math::{LmOptions, LmProblem, lm_fit};

/// Measured (delay ns, counts/s) points from the BiPo setup.
///
/// A handful of points read off the instrument, so they live here rather than
/// in a data file.
pub const BIPO_POINTS: [(f64, f64); 12] = [
    (188.0, 2.333333333),
    (261.0, 1.633333333),
    (319.0, 1.257142857),
    (314.0, 1.419047619),
    (309.0, 1.352380952),
    (573.0, 1.008333333),
    (705.0, 0.9833333333),
    (441.0, 1.108333333),
    (393.0, 1.1),
    (261.0, 2.133333333),
    (324.0, 1.666666667),
    (324.0, 1.6),
];

/// Default seed for `(offset, scale, lambda)`, from the bench trendline.
pub const DECAY_SEED: (f64, f64, f64) = (1.0, 4.0, 2e-3);

struct DecayProblem<'a> {
    points: &'a [(f64, f64)],
}

impl LmProblem for DecayProblem<'_> {
    fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.points.len(),
            self.points
                .iter()
                .map(|&(t, y)| y - (p[0] + p[1] * (-p[2] * t).exp())),
        )
    }

    fn jacobian(&self, p: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.points.len(), 3);
        for (i, &(t, _)) in self.points.iter().enumerate() {
            let e = (-p[2] * t).exp();
            jac[(i, 0)] = -1.0;
            jac[(i, 1)] = -e;
            jac[(i, 2)] = p[1] * t * e;
        }
        jac
    }
}

/// Fit the exponential decay model to `(delay ns, rate)` points.
pub fn fit_decay(points: &[(f64, f64)], seed: (f64, f64, f64)) -> Result<DecayFit, AppError> {
    if points.len() < 3 {
        return Err(AppError::input(format!(
            "Decay fit needs at least 3 points, got {}.",
            points.len()
        )));
    }

    let problem = DecayProblem { points };
    let p0 = DVector::from_row_slice(&[seed.0, seed.1, seed.2]);
    let lm = lm_fit(&problem, p0, &LmOptions::default()).map_err(|e| {
        AppError::numeric(format!("Decay fit did not converge: {e} (last {:?}).", e.last_params()))
    })?;

    Ok(DecayFit {
        offset: lm.params[0],
        scale: lm.params[1],
        lambda: lm.params[2],
        sse: lm.sse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_synthetic_decay_constant() {
        let (a, b, lam) = (0.8, 3.5, 2.5e-3);
        let points: Vec<(f64, f64)> = (0..30)
            .map(|i| {
                let t = 150.0 + i as f64 * 25.0;
                (t, a + b * (-lam * t).exp())
            })
            .collect();

        let fit = fit_decay(&points, DECAY_SEED).unwrap();
        assert!((fit.offset - a).abs() < 1e-6);
        assert!((fit.scale - b).abs() < 1e-5);
        assert!((fit.lambda - lam).abs() < 1e-8);
        assert!((fit.half_life_ns() - std::f64::consts::LN_2 / lam).abs() < 1e-3);
    }

    #[test]
    fn bench_dataset_fits_a_positive_half_life() {
        let fit = fit_decay(&BIPO_POINTS, DECAY_SEED).unwrap();
        assert!(fit.lambda > 0.0);
        assert!(fit.half_life_ns().is_finite());
        assert!(fit.half_life_ns() > 0.0);
        // The measured points scatter around the model by well under one
        // count/s each.
        assert!(fit.sse < 2.0);
    }

    #[test]
    fn too_few_points_is_an_input_error() {
        let err = fit_decay(&[(1.0, 1.0), (2.0, 0.5)], DECAY_SEED).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
