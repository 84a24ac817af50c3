//! Activity calculations.
//!
//! A source's activity in a given gamma line is inferred from the live-time
//! normalized count rate in a channel window around the peak, minus the same
//! window in the background spectrum. Known certificate activities are
//! decay-corrected to the measurement date, and a degree-1 line through
//! (measured rate, known Bq) converts measured rates into calibrated
//! activities for an unknown source.

use chrono::NaiveDate;

use crate::domain::{
    ActivityEstimate, EnergyCalibration, Nuclide, ReferenceActivity, Spectrum,
};
use crate::error::AppError;
use crate::math::poly::{polyfit, polyval};

/// Half-width, in channels, of the summation window around a peak.
pub const DEFAULT_WINDOW_TOL: usize = 30;

/// The date the lab spectra were acquired; decay corrections default to it.
pub fn default_measurement_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 3, 15).expect("valid date")
}

/// Background-subtracted count rate in a `±tol` channel window.
///
/// The counting uncertainty is `sqrt` of the raw background counts in the
/// window, following the lab procedure.
pub fn peak_activity(
    sample: &Spectrum,
    background: &Spectrum,
    peak_channel: usize,
    tol: usize,
) -> Result<ActivityEstimate, AppError> {
    if sample.live_time <= 0.0 || background.live_time <= 0.0 {
        return Err(AppError::input(format!(
            "Non-positive live time (sample {} s, background {} s).",
            sample.live_time, background.live_time
        )));
    }

    let start = peak_channel.saturating_sub(tol);
    let stop = peak_channel + tol;

    let bkg_sum = background.window_sum(start, stop);
    let smp_sum = sample.window_sum(start, stop);

    Ok(ActivityEstimate {
        rate: smp_sum / sample.live_time - bkg_sum / background.live_time,
        uncertainty: bkg_sum.sqrt(),
        window: (start, stop),
    })
}

/// Decay-correct a certificate activity to `asof`.
pub fn decayed_activity(
    reference: &ReferenceActivity,
    half_life_days: f64,
    asof: NaiveDate,
) -> f64 {
    let elapsed_days = (asof - reference.date).num_days() as f64;
    reference.bq * (-elapsed_days * std::f64::consts::LN_2 / half_life_days).exp()
}

/// Measured and known activities for every line of one calibration source.
#[derive(Debug, Clone)]
pub struct SourceActivities {
    pub nuclide: Nuclide,
    /// Window centers, from the energy calibration.
    pub peak_channels: Vec<usize>,
    /// Measured window rates, one per line.
    pub estimates: Vec<ActivityEstimate>,
    /// Known per-line activity (decay-corrected total x emission fraction).
    pub known_bq: Vec<f64>,
    /// Absolute uncertainty of the known total activity.
    pub known_uncertainty_bq: f64,
}

/// Measure all lines of a calibration source.
pub fn measure_source(
    nuclide: &Nuclide,
    sample: &Spectrum,
    background: &Spectrum,
    cal: &EnergyCalibration,
    tol: usize,
    asof: NaiveDate,
) -> Result<SourceActivities, AppError> {
    let total_bq = decayed_activity(&nuclide.reference, nuclide.half_life_days, asof);

    let mut peak_channels = Vec::with_capacity(nuclide.peaks_kev.len());
    let mut estimates = Vec::with_capacity(nuclide.peaks_kev.len());
    let mut known_bq = Vec::with_capacity(nuclide.peaks_kev.len());

    for (&energy, &intensity) in nuclide.peaks_kev.iter().zip(nuclide.intensities.iter()) {
        let channel = cal.channel_from_energy(energy).round();
        if !(channel.is_finite() && channel >= 0.0) {
            return Err(AppError::numeric(format!(
                "Energy {energy} keV maps outside the spectrum (channel {channel}).",
            )));
        }
        let channel = channel as usize;

        peak_channels.push(channel);
        estimates.push(peak_activity(sample, background, channel, tol)?);
        known_bq.push(total_bq * intensity / 100.0);
    }

    Ok(SourceActivities {
        nuclide: nuclide.clone(),
        peak_channels,
        estimates,
        known_bq,
        known_uncertainty_bq: total_bq * nuclide.reference.rel_uncertainty,
    })
}

/// Degree-1 line mapping measured window rates to known activities (Bq),
/// fitted through every line of every calibration source.
pub fn activity_line(sources: &[SourceActivities]) -> Result<[f64; 2], AppError> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for s in sources {
        for (est, &known) in s.estimates.iter().zip(s.known_bq.iter()) {
            xs.push(est.rate);
            ys.push(known);
        }
    }

    if xs.len() < 2 {
        return Err(AppError::input(format!(
            "Activity calibration needs at least 2 lines, got {}.",
            xs.len()
        )));
    }

    let coeffs = polyfit(&xs, &ys, 1)
        .ok_or_else(|| AppError::numeric("Activity calibration line fit is degenerate."))?;
    Ok([coeffs[0], coeffs[1]])
}

/// Convert measured rates to calibrated activities via the activity line.
pub fn calibrated_activities(line: &[f64; 2], estimates: &[ActivityEstimate]) -> Vec<f64> {
    estimates
        .iter()
        .map(|e| polyval(line, e.rate))
        .collect()
}
