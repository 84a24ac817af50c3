//! Energy calibration: a linear channel → energy relationship fitted through
//! (fitted peak center, tabulated energy) pairs.

use crate::domain::{CalibrationPoint, EnergyCalibration, GaussianComponent};
use crate::error::AppError;
use crate::math::poly::polyfit;

/// Pair fitted components with the tabulated line energies of one source.
///
/// Components arrive in ascending channel order from the peak fit, and the
/// nuclide tables list energies ascending, so index-wise pairing is the
/// physically correct association.
pub fn points_from_components(
    source: &str,
    components: &[GaussianComponent],
    energies_kev: &[f64],
) -> Result<Vec<CalibrationPoint>, AppError> {
    if components.len() != energies_kev.len() {
        return Err(AppError::input(format!(
            "Source {source}: {} fitted peaks but {} tabulated energies.",
            components.len(),
            energies_kev.len()
        )));
    }

    Ok(components
        .iter()
        .zip(energies_kev.iter())
        .map(|(c, &e)| CalibrationPoint {
            source: source.to_string(),
            channel: c.mean,
            channel_stdev: c.sigma(),
            energy_kev: e,
        })
        .collect())
}

/// Fit the degree-1 calibration line through all points, least squares.
pub fn fit_energy_line(points: &[CalibrationPoint]) -> Result<EnergyCalibration, AppError> {
    if points.len() < 2 {
        return Err(AppError::input(format!(
            "Energy calibration needs at least 2 peaks, got {}.",
            points.len()
        )));
    }

    let xs: Vec<f64> = points.iter().map(|p| p.channel).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.energy_kev).collect();
    let coeffs = polyfit(&xs, &ys, 1)
        .ok_or_else(|| AppError::numeric("Energy calibration line fit is degenerate."))?;

    Ok(EnergyCalibration {
        slope: coeffs[0],
        intercept: coeffs[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(channel: f64, energy_kev: f64) -> CalibrationPoint {
        CalibrationPoint {
            source: "test".to_string(),
            channel,
            channel_stdev: 1.0,
            energy_kev,
        }
    }

    #[test]
    fn exact_line_is_recovered() {
        // Typical HPGe scale: ~0.33 keV/channel.
        let points: Vec<CalibrationPoint> = [350.0, 1200.0, 3550.0, 4020.0]
            .iter()
            .map(|&ch| point(ch, 0.3312 * ch + 0.8))
            .collect();

        let cal = fit_energy_line(&points).unwrap();
        assert!((cal.slope - 0.3312).abs() < 1e-9);
        assert!((cal.intercept - 0.8).abs() < 1e-6);
        assert!((cal.energy_from_channel(2000.0) - (0.3312 * 2000.0 + 0.8)).abs() < 1e-6);
    }

    #[test]
    fn single_point_is_rejected() {
        let err = fit_energy_line(&[point(100.0, 33.0)]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn component_energy_pairing_checks_lengths() {
        let comps = [GaussianComponent {
            amplitude: 1.0,
            mean: 10.0,
            variance: 4.0,
        }];
        assert!(points_from_components("Co60", &comps, &[1173.288, 1332.492]).is_err());

        let points = points_from_components("Na22", &comps, &[1274.5]).unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].channel_stdev - 2.0).abs() < 1e-12);
    }
}
