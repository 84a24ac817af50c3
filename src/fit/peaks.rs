//! The all-or-nothing multi-peak fit.
//!
//! Pipeline per call:
//!
//! 1. candidate scan (prominence + width filters)
//! 2. select the `n_peaks` most prominent candidates (ties: ascending channel)
//! 3. build background bands and the parity mask
//! 4. quadratic background fit, evaluated over all channels
//! 5. subtract the background from the raw counts
//! 6. joint Levenberg–Marquardt fit of one Gaussian per selected candidate
//! 7. return the fitted means in selection order
//!
//! The call either returns exactly `n_peaks` components or fails; no partial
//! results. There is no hidden state: identical inputs give identical output.

use nalgebra::DVector;

use crate::domain::{GaussianComponent, PeakCandidate, PeakFit, PeakSearch, Spectrum};
use crate::error::AppError;
use crate::fit::background::{background_bands, background_mask, fit_background};
use crate::fit::detect::find_candidates;
use crate::fit::gaussian::{AMPLITUDE_SEED, GaussianSumProblem, VARIANCE_SEED};
use crate::math::poly::polyval;
use crate::math::{LmOptions, lm_fit};

/// Why a peak fit failed.
///
/// Neither case is retryable with the same inputs: the caller must loosen the
/// detection thresholds (insufficient peaks) or change the seeds / window
/// (non-convergence) before trying again.
#[derive(Debug, Clone)]
pub enum PeakFitError {
    /// Fewer prominent candidates than requested; carries what *was* found so
    /// the caller can diagnose threshold choices.
    InsufficientPeaks {
        requested: usize,
        found: Vec<PeakCandidate>,
    },
    /// The nonlinear solver gave up; `last` is the final parameter estimate
    /// when one exists (flat `(amp, mean, var)*` layout).
    Convergence { last: Option<Vec<f64>> },
}

impl std::fmt::Display for PeakFitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeakFitError::InsufficientPeaks { requested, found } => {
                let channels: Vec<usize> = found.iter().map(|c| c.channel).collect();
                let heights: Vec<f64> = found.iter().map(|c| c.height).collect();
                write!(
                    f,
                    "Fewer peaks found than required: {} < {requested} \
                     (channels {channels:?}, counts {heights:?}). \
                     Try loosening the prominence/width thresholds.",
                    found.len()
                )
            }
            PeakFitError::Convergence { last } => match last {
                Some(p) => write!(f, "Gaussian fit did not converge; last estimate {p:?}."),
                None => write!(f, "Gaussian fit did not converge (degenerate background mask)."),
            },
        }
    }
}

impl std::error::Error for PeakFitError {}

impl From<PeakFitError> for AppError {
    fn from(err: PeakFitError) -> Self {
        let code = match &err {
            PeakFitError::InsufficientPeaks { .. } => 3,
            PeakFitError::Convergence { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}

/// Observer hook for diagnostic output (plots, logs).
///
/// Rendering is a presentation concern and stays out of the fit contract;
/// callers inject an observer when they want diagnostics.
pub trait FitObserver: Sync {
    fn on_fit(&self, spectrum: &Spectrum, fit: &PeakFit);
}

/// Observer that does nothing.
pub struct NullObserver;

impl FitObserver for NullObserver {
    fn on_fit(&self, _spectrum: &Spectrum, _fit: &PeakFit) {}
}

/// Locate and fit the `search.n_peaks` most prominent peaks of `spectrum`.
///
/// On success the result holds exactly `n_peaks` Gaussian components, ordered
/// by candidate selection order (ascending channel).
pub fn fit_peaks(
    spectrum: &Spectrum,
    search: &PeakSearch,
    observer: &dyn FitObserver,
) -> Result<PeakFit, PeakFitError> {
    let counts = spectrum.counts_f64();

    let candidates = find_candidates(&counts, search.prominence_threshold, search.min_width);
    if candidates.len() < search.n_peaks {
        return Err(PeakFitError::InsufficientPeaks {
            requested: search.n_peaks,
            found: candidates,
        });
    }

    let selected = select_candidates(&candidates, search.n_peaks);

    let bands = background_bands(&selected, search.background_halfwidth);
    let mask = background_mask(counts.len(), &bands);
    let background =
        fit_background(&counts, &mask).ok_or(PeakFitError::Convergence { last: None })?;

    let background_curve: Vec<f64> = (0..counts.len())
        .map(|ch| polyval(&background, ch as f64))
        .collect();
    let flattened: Vec<f64> = counts
        .iter()
        .zip(background_curve.iter())
        .map(|(&c, &b)| c - b)
        .collect();

    // Fixed seeds per component; see `fit::gaussian` for why these are not
    // derived from the measured candidate widths.
    let mut seed = Vec::with_capacity(3 * selected.len());
    for c in &selected {
        seed.extend_from_slice(&[AMPLITUDE_SEED, c.channel as f64, VARIANCE_SEED]);
    }

    let xs: Vec<f64> = (0..counts.len()).map(|ch| ch as f64).collect();
    let problem = GaussianSumProblem {
        xs: &xs,
        ys: &flattened,
    };
    let lm = lm_fit(&problem, DVector::from_vec(seed), &LmOptions::default()).map_err(|e| {
        PeakFitError::Convergence {
            last: Some(e.last_params().to_vec()),
        }
    })?;

    let components: Vec<GaussianComponent> = lm
        .params
        .as_slice()
        .chunks_exact(3)
        .map(|p| GaussianComponent {
            amplitude: p[0],
            mean: p[1],
            variance: p[2],
        })
        .collect();

    let fit = PeakFit {
        components,
        candidates: selected,
        background,
        background_curve,
        background_bands: bands,
        sse: lm.sse,
        iterations: lm.iterations,
    };

    observer.on_fit(spectrum, &fit);
    Ok(fit)
}

/// Keep the `n` most prominent candidates.
///
/// Ties break by ascending channel (the discovery order of the left-to-right
/// scan). The survivors are returned in ascending channel order, which is the
/// order the fitted components are reported in.
fn select_candidates(candidates: &[PeakCandidate], n: usize) -> Vec<PeakCandidate> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .prominence
            .partial_cmp(&candidates[a].prominence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(candidates[a].channel.cmp(&candidates[b].channel))
    });

    let mut keep: Vec<usize> = order.into_iter().take(n).collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| candidates[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn gaussian(x: f64, amp: f64, mean: f64, var: f64) -> f64 {
        amp * (-(x - mean).powi(2) / (2.0 * var)).exp()
    }

    fn spectrum_from(counts: Vec<u32>) -> Spectrum {
        Spectrum::new("test", "test", counts, 180.0, 180.0)
    }

    /// The reference scenario: 8191 zero-background channels with two
    /// well-separated Gaussians.
    fn two_peak_spectrum() -> Spectrum {
        let counts: Vec<u32> = (0..8191)
            .map(|ch| {
                let x = ch as f64;
                (gaussian(x, 5000.0, 1000.0, 25.0) + gaussian(x, 8000.0, 5000.0, 16.0)).round()
                    as u32
            })
            .collect();
        spectrum_from(counts)
    }

    #[test]
    fn two_known_gaussians_are_recovered() {
        let spec = two_peak_spectrum();
        let fit = fit_peaks(&spec, &PeakSearch::new(2), &NullObserver).unwrap();

        let centers = fit.centers();
        assert_eq!(centers.len(), 2);
        assert!((centers[0] - 1000.0).abs() < 0.5, "center 0: {}", centers[0]);
        assert!((centers[1] - 5000.0).abs() < 0.5, "center 1: {}", centers[1]);

        // Amplitudes and variances should land near the truth as well.
        assert!((fit.components[0].amplitude - 5000.0).abs() < 50.0);
        assert!((fit.components[0].variance - 25.0).abs() < 1.0);
        assert!((fit.components[1].amplitude - 8000.0).abs() < 50.0);
        assert!((fit.components[1].variance - 16.0).abs() < 1.0);
    }

    #[test]
    fn noisy_spectrum_still_fits_within_a_channel() {
        let mut rng = StdRng::seed_from_u64(7);
        let counts: Vec<u32> = (0..4096)
            .map(|ch| {
                let x = ch as f64;
                let signal = gaussian(x, 5000.0, 800.0, 25.0) + gaussian(x, 3000.0, 2500.0, 49.0);
                // Flat noise well below the prominence threshold.
                signal.round() as u32 + rng.gen_range(0..40)
            })
            .collect();
        let spec = spectrum_from(counts);

        let fit = fit_peaks(&spec, &PeakSearch::new(2), &NullObserver).unwrap();
        let centers = fit.centers();
        assert!((centers[0] - 800.0).abs() < 1.0);
        assert!((centers[1] - 2500.0).abs() < 1.0);
    }

    #[test]
    fn requesting_more_peaks_than_exist_fails() {
        let spec = two_peak_spectrum();
        let err = fit_peaks(&spec, &PeakSearch::new(3), &NullObserver).unwrap_err();
        match err {
            PeakFitError::InsufficientPeaks { requested, found } => {
                assert_eq!(requested, 3);
                assert_eq!(found.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_spectrum_reports_zero_candidates() {
        let spec = spectrum_from(vec![0; 1024]);
        let err = fit_peaks(&spec, &PeakSearch::new(1), &NullObserver).unwrap_err();
        match err {
            PeakFitError::InsufficientPeaks { found, .. } => assert!(found.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn centers_come_back_in_selection_order_not_amplitude_order() {
        // Larger peak to the right: result must still be ascending channel.
        let counts: Vec<u32> = (0..4096)
            .map(|ch| {
                let x = ch as f64;
                (gaussian(x, 2000.0, 600.0, 36.0) + gaussian(x, 9000.0, 3000.0, 36.0)).round()
                    as u32
            })
            .collect();
        let fit = fit_peaks(&spectrum_from(counts), &PeakSearch::new(2), &NullObserver).unwrap();
        let centers = fit.centers();
        assert!(centers[0] < centers[1]);
        assert!((centers[0] - 600.0).abs() < 0.5);
        assert!((centers[1] - 3000.0).abs() < 0.5);
    }

    #[test]
    fn selection_keeps_most_prominent_and_restores_scan_order() {
        let make = |channel: usize, prominence: f64| PeakCandidate {
            channel,
            height: prominence,
            prominence,
            width: 6.0,
        };
        let candidates = vec![make(100, 50.0), make(200, 300.0), make(300, 200.0)];
        let selected = select_candidates(&candidates, 2);
        let channels: Vec<usize> = selected.iter().map(|c| c.channel).collect();
        assert_eq!(channels, vec![200, 300]);

        // Equal prominences: the leftmost candidates win.
        let candidates = vec![make(10, 100.0), make(20, 100.0), make(30, 100.0)];
        let selected = select_candidates(&candidates, 2);
        let channels: Vec<usize> = selected.iter().map(|c| c.channel).collect();
        assert_eq!(channels, vec![10, 20]);
    }

    #[test]
    fn identical_inputs_yield_identical_fits() {
        let spec = two_peak_spectrum();
        let a = fit_peaks(&spec, &PeakSearch::new(2), &NullObserver).unwrap();
        let b = fit_peaks(&spec, &PeakSearch::new(2), &NullObserver).unwrap();
        assert_eq!(a.centers(), b.centers());
        assert_eq!(a.sse, b.sse);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn observer_sees_the_finished_fit() {
        use std::sync::Mutex;

        struct Recorder(Mutex<Vec<usize>>);
        impl FitObserver for Recorder {
            fn on_fit(&self, _spectrum: &Spectrum, fit: &PeakFit) {
                self.0.lock().unwrap().push(fit.components.len());
            }
        }

        let recorder = Recorder(Mutex::new(Vec::new()));
        let spec = two_peak_spectrum();
        fit_peaks(&spec, &PeakSearch::new(2), &recorder).unwrap();
        assert_eq!(*recorder.0.lock().unwrap(), vec![2]);
    }
}
