//! Core value types for spectra, peak candidates, and fit results.

use serde::Serialize;

/// A single acquired gamma spectrum.
///
/// Counts are indexed by channel number (`0..n_channels-1`, fixed at
/// acquisition time) and are immutable once read.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Short identifier, e.g. `"Co60"` or `"bkg"`.
    pub name: String,
    /// Human-readable label for plots and reports.
    pub label: String,
    /// Raw channel counts.
    pub counts: Vec<u32>,
    /// Active counting duration (dead time excluded), seconds.
    pub live_time: f64,
    /// Wall-clock acquisition duration, seconds.
    pub real_time: f64,
}

impl Spectrum {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        counts: Vec<u32>,
        live_time: f64,
        real_time: f64,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            counts,
            live_time,
            real_time,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.counts.len()
    }

    /// Counts as doubles, for the numerical pipeline.
    pub fn counts_f64(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// Sum of counts over the half-open channel window `[start, stop)`,
    /// clamped to the spectrum bounds.
    pub fn window_sum(&self, start: usize, stop: usize) -> f64 {
        let stop = stop.min(self.counts.len());
        if start >= stop {
            return 0.0;
        }
        self.counts[start..stop].iter().map(|&c| c as f64).sum()
    }
}

/// A prominent local maximum found by the candidate scan.
///
/// Transient: produced and consumed within one `fit_peaks` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakCandidate {
    /// Channel index of the maximum.
    pub channel: usize,
    /// Raw count at the maximum.
    pub height: f64,
    /// Topographic prominence (height above the higher bounding valley).
    pub prominence: f64,
    /// Interpolated width (channels) at half-prominence height.
    pub width: f64,
}

/// One fitted Gaussian, parameterized as amplitude / mean / variance.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GaussianComponent {
    pub amplitude: f64,
    pub mean: f64,
    pub variance: f64,
}

impl GaussianComponent {
    pub fn eval(&self, x: f64) -> f64 {
        let d = x - self.mean;
        self.amplitude * (-d * d / (2.0 * self.variance)).exp()
    }

    /// Standard deviation of the component (used as the center uncertainty).
    pub fn sigma(&self) -> f64 {
        self.variance.abs().sqrt()
    }

    pub fn fwhm(&self) -> f64 {
        // FWHM = 2 sqrt(2 ln 2) sigma
        2.0 * (2.0 * std::f64::consts::LN_2).sqrt() * self.sigma()
    }
}

/// Detection/fit parameters for one `fit_peaks` call.
#[derive(Debug, Clone, Copy)]
pub struct PeakSearch {
    /// Number of peaks to return. The fit is all-or-nothing: fewer prominent
    /// candidates than this is an error, never a shorter result.
    pub n_peaks: usize,
    /// Minimum topographic prominence for a candidate.
    pub prominence_threshold: f64,
    /// Minimum half-prominence width (channels) for a candidate.
    pub min_width: f64,
    /// Width of each background sampling band beside a peak (channels).
    pub background_halfwidth: f64,
}

impl PeakSearch {
    /// Lab defaults: prominence 100, width 5, background halfwidth 70.
    pub fn new(n_peaks: usize) -> Self {
        Self {
            n_peaks,
            prominence_threshold: 100.0,
            min_width: 5.0,
            background_halfwidth: 70.0,
        }
    }

    pub fn background_halfwidth(mut self, halfwidth: f64) -> Self {
        self.background_halfwidth = halfwidth;
        self
    }
}

/// The full outcome of one successful multi-Gaussian peak fit.
///
/// `components` are ordered by candidate selection order (ascending channel,
/// since the scan proceeds left to right); they are deliberately *not*
/// re-sorted by channel or amplitude.
#[derive(Debug, Clone)]
pub struct PeakFit {
    /// Fitted Gaussians, one per requested peak, in selection order.
    pub components: Vec<GaussianComponent>,
    /// The selected candidates that seeded the fit, same order.
    pub candidates: Vec<PeakCandidate>,
    /// Quadratic background coefficients, highest power first.
    pub background: [f64; 3],
    /// Background polynomial evaluated over all channels.
    pub background_curve: Vec<f64>,
    /// Background sampling bands `(start, stop)` used for the mask.
    pub background_bands: Vec<(f64, f64)>,
    /// Sum of squared residuals of the Gaussian fit.
    pub sse: f64,
    /// Levenberg–Marquardt iterations used.
    pub iterations: usize,
}

impl PeakFit {
    /// Fitted peak centers (fractional channels), in selection order.
    pub fn centers(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.mean).collect()
    }

    /// Sum of fitted Gaussians at channel `x` (background excluded).
    pub fn model(&self, x: f64) -> f64 {
        self.components.iter().map(|c| c.eval(x)).sum()
    }
}

/// Linear channel → energy relationship from the calibration fit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EnergyCalibration {
    /// keV per channel.
    pub slope: f64,
    /// keV at channel 0.
    pub intercept: f64,
}

impl EnergyCalibration {
    pub fn energy_from_channel(&self, channel: f64) -> f64 {
        self.slope * channel + self.intercept
    }

    /// Inverse mapping; the result is generally not an integer channel.
    pub fn channel_from_energy(&self, energy_kev: f64) -> f64 {
        (energy_kev - self.intercept) / self.slope
    }
}

/// One (fitted center, known energy) pair feeding the calibration line.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationPoint {
    /// Source the peak came from, e.g. `"Ba133"`.
    pub source: String,
    /// Fitted peak center, fractional channels.
    pub channel: f64,
    /// Center uncertainty (sigma of the fitted Gaussian), channels.
    pub channel_stdev: f64,
    /// Tabulated emission energy, keV.
    pub energy_kev: f64,
}

/// Background-subtracted count rate in a peak window.
#[derive(Debug, Clone, Copy)]
pub struct ActivityEstimate {
    /// Sample window rate minus background window rate, counts/s.
    pub rate: f64,
    /// Counting uncertainty: sqrt of raw background counts in the window.
    pub uncertainty: f64,
    /// The channel window `[start, stop)` that was summed.
    pub window: (usize, usize),
}

/// Result of the delay-coincidence exponential fit
/// `counts(t) = offset + scale * exp(-lambda * t)`.
#[derive(Debug, Clone, Copy)]
pub struct DecayFit {
    pub offset: f64,
    pub scale: f64,
    /// Decay constant, 1/ns.
    pub lambda: f64,
    pub sse: f64,
}

impl DecayFit {
    pub fn eval(&self, delay_ns: f64) -> f64 {
        self.offset + self.scale * (-self.lambda * delay_ns).exp()
    }

    /// Half-life `ln 2 / lambda`, ns.
    pub fn half_life_ns(&self) -> f64 {
        std::f64::consts::LN_2 / self.lambda
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_eval_and_fwhm() {
        let g = GaussianComponent {
            amplitude: 100.0,
            mean: 50.0,
            variance: 4.0,
        };
        assert!((g.eval(50.0) - 100.0).abs() < 1e-12);
        // At one sigma the value is amp * exp(-1/2).
        assert!((g.eval(52.0) - 100.0 * (-0.5f64).exp()).abs() < 1e-9);
        assert!((g.fwhm() - 2.0 * (2.0 * std::f64::consts::LN_2).sqrt() * 2.0).abs() < 1e-12);
    }

    #[test]
    fn calibration_roundtrip() {
        let cal = EnergyCalibration {
            slope: 0.35,
            intercept: -1.2,
        };
        let ch = 1234.5;
        let e = cal.energy_from_channel(ch);
        assert!((cal.channel_from_energy(e) - ch).abs() < 1e-9);
    }

    #[test]
    fn window_sum_clamps_to_bounds() {
        let spec = Spectrum::new("s", "s", vec![1, 2, 3, 4], 10.0, 12.0);
        assert_eq!(spec.window_sum(1, 3), 5.0);
        assert_eq!(spec.window_sum(2, 100), 7.0);
        assert_eq!(spec.window_sum(3, 3), 0.0);
    }
}
