//! Plain-text report blocks for the terminal.
//!
//! Everything here is pure string formatting over finished results; the
//! functions return the text instead of printing so tests can assert on it.

use crate::activity::SourceActivities;
use crate::domain::{CalibrationPoint, DecayFit, EnergyCalibration, PeakFit, Spectrum};

/// One fitted spectrum: components, background, and (when calibrated)
/// energies.
pub fn format_peak_fit(
    spectrum: &Spectrum,
    fit: &PeakFit,
    cal: Option<&EnergyCalibration>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Spectrum {} ({}): {} peak(s), {} LM iteration(s), SSE {:.4e}\n",
        spectrum.name,
        spectrum.label,
        fit.components.len(),
        fit.iterations,
        fit.sse,
    ));

    for (i, comp) in fit.components.iter().enumerate() {
        out.push_str(&format!(
            "  peak {}: center = {:.3} +/- {:.3} ch, amplitude = {:.1}, FWHM = {:.2} ch",
            i + 1,
            comp.mean,
            comp.sigma(),
            comp.amplitude,
            comp.fwhm(),
        ));
        if let Some(cal) = cal {
            out.push_str(&format!(
                ", energy = {:.3} +/- {:.3} keV",
                cal.energy_from_channel(comp.mean),
                comp.sigma() * cal.slope.abs(),
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "  background: {:.4e} x^2 + {:.4e} x + {:.4e}\n",
        fit.background[0], fit.background[1], fit.background[2],
    ));
    out
}

/// The calibration points and the fitted energy line.
pub fn format_calibration(points: &[CalibrationPoint], cal: &EnergyCalibration) -> String {
    let mut out = String::new();
    out.push_str("Energy calibration points:\n");
    for p in points {
        out.push_str(&format!(
            "  {:>6}: channel {:.3} +/- {:.3}  ->  {:.3} keV\n",
            p.source, p.channel, p.channel_stdev, p.energy_kev,
        ));
    }
    out.push_str(&format!(
        "Energy(channel) = {:.6} * channel + {:.6} [keV]\n",
        cal.slope, cal.intercept,
    ));
    out
}

/// Per-source activity block, lab-notebook style.
pub fn format_source_activities(source: &SourceActivities) -> String {
    let energies: Vec<String> = source
        .nuclide
        .peaks_kev
        .iter()
        .map(|e| format!("{e:.3}"))
        .collect();
    let rates: Vec<String> = source
        .estimates
        .iter()
        .map(|e| format!("{:.3}", e.rate))
        .collect();
    let uncertainties: Vec<String> = source
        .estimates
        .iter()
        .map(|e| format!("{:.3}", e.uncertainty))
        .collect();
    let known: Vec<String> = source.known_bq.iter().map(|b| format!("{b:.1}")).collect();

    let mut out = String::new();
    out.push_str(&format!("For source {}:\n", source.nuclide.id.name()));
    out.push_str(&format!("  Peak energies [keV] = [{}]\n", energies.join(", ")));
    out.push_str(&format!(
        "  Measured window rates [counts/s] = [{}]\n",
        rates.join(", ")
    ));
    out.push_str(&format!(
        "  Rate uncertainties [sqrt(bkg counts)] = [{}]\n",
        uncertainties.join(", ")
    ));
    out.push_str(&format!(
        "  Known line activities [Bq] = [{}] (+/- {:.1} Bq total)\n",
        known.join(", "),
        source.known_uncertainty_bq,
    ));
    out
}

/// The unknown-source block: measured rate, energy, and calibrated activity.
pub fn format_unknown(
    fit: &PeakFit,
    energy_kev: f64,
    rate: f64,
    uncertainty: f64,
    calibrated_bq: f64,
) -> String {
    let center = fit.components.first().map(|c| c.mean).unwrap_or(f64::NAN);
    let sigma = fit.components.first().map(|c| c.sigma()).unwrap_or(f64::NAN);

    let mut out = String::new();
    out.push_str("Unknown source:\n");
    out.push_str(&format!(
        "  Peak center = {center:.3} +/- {sigma:.3} ch, energy = {energy_kev:.3} keV\n"
    ));
    out.push_str(&format!(
        "  Window rate = {rate:.3} +/- {uncertainty:.3} counts/s\n"
    ));
    out.push_str(&format!("  Calibrated activity = {calibrated_bq:.1} Bq\n"));
    out
}

/// The delay-coincidence fit summary.
pub fn format_decay(fit: &DecayFit) -> String {
    let mut out = String::new();
    out.push_str("BiPo-212 delay-coincidence fit:\n");
    out.push_str(&format!(
        "  rate(t) = {:.4} + {:.4} * exp(-{:.6} * t)   (SSE {:.4e})\n",
        fit.offset, fit.scale, fit.lambda, fit.sse,
    ));
    out.push_str(&format!(
        "  Po-212 half-life = {:.1} ns\n",
        fit.half_life_ns()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GaussianComponent;

    fn sample_fit() -> PeakFit {
        PeakFit {
            components: vec![GaussianComponent {
                amplitude: 5000.0,
                mean: 1000.25,
                variance: 25.0,
            }],
            candidates: vec![],
            background: [1e-6, -0.01, 20.0],
            background_curve: vec![],
            background_bands: vec![],
            sse: 12.5,
            iterations: 17,
        }
    }

    #[test]
    fn peak_fit_block_carries_center_and_energy() {
        let spectrum = Spectrum::new("Co60", "Co-60 source", vec![0; 16], 180.0, 180.0);
        let cal = EnergyCalibration {
            slope: 0.5,
            intercept: 0.0,
        };

        let text = format_peak_fit(&spectrum, &sample_fit(), Some(&cal));
        assert!(text.contains("Spectrum Co60"));
        assert!(text.contains("center = 1000.250"));
        assert!(text.contains("energy = 500.125"));
        // sigma 5 ch * 0.5 keV/ch
        assert!(text.contains("+/- 2.500 keV"));
    }

    #[test]
    fn decay_block_reports_the_half_life() {
        let fit = DecayFit {
            offset: 1.0,
            scale: 4.0,
            lambda: std::f64::consts::LN_2 / 300.0,
            sse: 0.01,
        };
        let text = format_decay(&fit);
        assert!(text.contains("half-life = 300.0 ns"));
    }

    #[test]
    fn calibration_block_lists_every_point() {
        let points = vec![
            CalibrationPoint {
                source: "Co60".to_string(),
                channel: 3542.0,
                channel_stdev: 2.0,
                energy_kev: 1173.288,
            },
            CalibrationPoint {
                source: "Na22".to_string(),
                channel: 3847.0,
                channel_stdev: 2.1,
                energy_kev: 1274.5,
            },
        ];
        let cal = EnergyCalibration {
            slope: 0.3312,
            intercept: 0.8,
        };
        let text = format_calibration(&points, &cal);
        assert!(text.contains("Co60"));
        assert!(text.contains("Na22"));
        assert!(text.contains("0.331200 * channel"));
    }
}
