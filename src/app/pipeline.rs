//! Shared pipeline logic for the calibration and activity commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load spectra -> fit peaks -> energy calibration -> window activities ->
//! activity line -> unknown-source identification.
//!
//! The CLI handlers in `app` then focus on presentation (printing, plots,
//! exports).

use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::activity::{
    SourceActivities, activity_line, measure_source, peak_activity,
};
use crate::calib::{fit_energy_line, points_from_components};
use crate::data::{SourcePlan, calibration_plans, load_background, load_source, load_unknown, unknown_search};
use crate::domain::{
    ActivityEstimate, CalibrationPoint, EnergyCalibration, GaussianComponent, Nuclide, PeakFit,
    Spectrum,
};
use crate::error::AppError;
use crate::fit::peaks::{FitObserver, fit_peaks};
use crate::math::poly::polyval;

/// One calibration source, fitted.
#[derive(Debug, Clone)]
pub struct SourceFit {
    pub nuclide: Nuclide,
    pub spectrum: Spectrum,
    pub fit: PeakFit,
    /// The fitted components feeding the calibration, after dropping peaks
    /// with no tabulated line (e.g. the 511 keV annihilation peak).
    pub kept: Vec<GaussianComponent>,
}

/// All outputs of a calibration run.
#[derive(Debug, Clone)]
pub struct CalibrationOutput {
    pub fits: Vec<SourceFit>,
    pub points: Vec<CalibrationPoint>,
    pub calibration: EnergyCalibration,
}

/// The unknown sample, fitted and converted to a calibrated activity.
#[derive(Debug, Clone)]
pub struct UnknownResult {
    pub spectrum: Spectrum,
    pub fit: PeakFit,
    /// Energy of the fitted peak under the calibration, keV.
    pub energy_kev: f64,
    pub measured: ActivityEstimate,
    pub calibrated_bq: f64,
}

/// All outputs of an activity run.
#[derive(Debug, Clone)]
pub struct ActivityOutput {
    pub calibration: CalibrationOutput,
    pub sources: Vec<SourceActivities>,
    /// Degree-1 line mapping measured window rates to known activities.
    pub line: [f64; 2],
    pub unknown: UnknownResult,
}

fn fit_plan(
    data_dir: &Path,
    plan: &SourcePlan,
    observer: &dyn FitObserver,
) -> Result<SourceFit, AppError> {
    let nuclide = plan.nuclide.data();
    let spectrum = load_source(data_dir, plan)?;
    let fit = fit_peaks(&spectrum, &plan.search, observer)?;

    let kept = match plan.keep {
        Some(indices) => indices
            .iter()
            .map(|&i| {
                fit.components.get(i).copied().ok_or_else(|| {
                    AppError::numeric(format!(
                        "{}: keep index {i} out of range ({} components fitted).",
                        plan.nuclide.name(),
                        fit.components.len()
                    ))
                })
            })
            .collect::<Result<Vec<GaussianComponent>, AppError>>()?,
        None => fit.components.clone(),
    };

    Ok(SourceFit {
        nuclide,
        spectrum,
        fit,
        kept,
    })
}

/// Fit all calibration sources (in parallel) and fit the energy line.
pub fn run_calibration(
    data_dir: &Path,
    observer: &dyn FitObserver,
) -> Result<CalibrationOutput, AppError> {
    let plans = calibration_plans();

    let fits: Vec<SourceFit> = plans
        .par_iter()
        .map(|plan| fit_plan(data_dir, plan, observer))
        .collect::<Result<Vec<SourceFit>, AppError>>()?;

    let mut points = Vec::new();
    for source in &fits {
        points.extend(points_from_components(
            source.nuclide.id.name(),
            &source.kept,
            &source.nuclide.peaks_kev,
        )?);
    }

    let calibration = fit_energy_line(&points)?;
    Ok(CalibrationOutput {
        fits,
        points,
        calibration,
    })
}

/// Full activity workflow: calibrate, measure every source line against the
/// background, fit the activity line, and identify the unknown sample.
pub fn run_activity(
    data_dir: &Path,
    tol: usize,
    asof: NaiveDate,
    observer: &dyn FitObserver,
) -> Result<ActivityOutput, AppError> {
    let calibration = run_calibration(data_dir, observer)?;
    let background = load_background(data_dir)?;

    let sources = calibration
        .fits
        .iter()
        .map(|source| {
            measure_source(
                &source.nuclide,
                &source.spectrum,
                &background,
                &calibration.calibration,
                tol,
                asof,
            )
        })
        .collect::<Result<Vec<SourceActivities>, AppError>>()?;

    let line = activity_line(&sources)?;

    let unknown_spectrum = load_unknown(data_dir)?;
    let unknown_fit = fit_peaks(&unknown_spectrum, &unknown_search(), observer)?;
    let center = unknown_fit.components[0].mean;
    if !(center.is_finite() && center >= 0.0) {
        return Err(AppError::numeric(format!(
            "Unknown-source peak center {center} is outside the spectrum."
        )));
    }

    let measured = peak_activity(&unknown_spectrum, &background, center.round() as usize, tol)?;
    let calibrated_bq = polyval(&line, measured.rate);
    let energy_kev = calibration.calibration.energy_from_channel(center);

    Ok(ActivityOutput {
        calibration,
        sources,
        line,
        unknown: UnknownResult {
            spectrum: unknown_spectrum,
            fit: unknown_fit,
            energy_kev,
            measured,
            calibrated_bq,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        BA133_FILE, BKG_FILE, CO60_FILE, NA22_FILE, SynthPeak, SynthSpec, UNKNOWN_FILE,
        generate_spectrum,
    };
    use crate::fit::peaks::NullObserver;
    use crate::io::spe::write_spectrum;

    /// Write a synthetic dataset whose peak channels sit exactly where the
    /// tabulated energies land under `energy = 0.25 * channel`. That slope
    /// keeps the Ba-133 lines far enough apart that no background band
    /// reaches a neighboring peak.
    fn write_dataset(dir: &Path) {
        let slope = 0.25;
        let mut seed = 1u64;
        let mut write = |filename: &str, energies: &[f64], amplitude: f64, live: f64| {
            let peaks: Vec<SynthPeak> = energies
                .iter()
                .map(|&e| SynthPeak {
                    amplitude,
                    mean: e / slope,
                    variance: 16.0,
                })
                .collect();
            let spec = SynthSpec {
                n_channels: 8191,
                peaks,
                flat_level: 10.0,
                seed,
                live_time: live,
                real_time: live,
            };
            seed += 1;
            let spectrum = generate_spectrum(&spec, filename).unwrap();
            write_spectrum(&dir.join(filename), &spectrum).unwrap();
        };

        write(CO60_FILE, &[1173.288, 1332.492], 6000.0, 180.0);
        write(
            BA133_FILE,
            &[80.9979, 276.3989, 302.8508, 356.0129, 383.8485],
            6000.0,
            180.0,
        );
        // Na-22: annihilation line at 511 keV plus the tabulated gamma.
        write(NA22_FILE, &[511.0, 1274.5], 6000.0, 180.0);
        write(UNKNOWN_FILE, &[661.7], 4000.0, 5400.0);

        // Flat background, no peaks.
        let bkg = SynthSpec {
            n_channels: 8191,
            peaks: vec![],
            flat_level: 10.0,
            seed: 99,
            live_time: 5400.0,
            real_time: 5400.0,
        };
        write_spectrum(&dir.join(BKG_FILE), &generate_spectrum(&bkg, "bkg").unwrap()).unwrap();
    }

    #[test]
    fn synthetic_dataset_calibrates_to_the_planted_slope() {
        let dir = std::env::temp_dir().join(format!("nuclab_pipe_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_dataset(&dir);

        let out = run_calibration(&dir, &NullObserver).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        // 2 (Co60) + 5 (Ba133) + 1 (Na22, annihilation peak dropped) points.
        assert_eq!(out.points.len(), 8);
        assert!((out.calibration.slope - 0.25).abs() < 0.001, "slope {}", out.calibration.slope);
        assert!(out.calibration.intercept.abs() < 2.0);

        // The unknown at 661.7 keV resolves through the same line.
        let ch = out.calibration.channel_from_energy(661.7);
        assert!((ch - 661.7 / 0.25).abs() < 5.0);
    }

    #[test]
    fn activity_run_identifies_the_unknown_peak_energy() {
        let dir = std::env::temp_dir().join(format!("nuclab_act_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_dataset(&dir);

        let asof = crate::activity::default_measurement_date();
        let out = run_activity(&dir, 30, asof, &NullObserver).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(out.sources.len(), 3);
        assert!((out.unknown.energy_kev - 661.7).abs() < 2.0);
        assert!(out.unknown.measured.rate > 0.0);
        assert!(out.unknown.calibrated_bq.is_finite());
    }
}
