//! Export fitted peaks and calibrations for spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{CalibrationPoint, EnergyCalibration, PeakFit};
use crate::error::AppError;

/// Write fitted peak parameters to a CSV file.
///
/// When a calibration is supplied, each row also carries the fitted center
/// mapped to energy.
pub fn write_peaks_csv(
    path: &Path,
    spectrum_name: &str,
    fit: &PeakFit,
    cal: Option<&EnergyCalibration>,
) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create peaks CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "spectrum,peak,center_channel,center_stdev,amplitude,variance,fwhm_channels,energy_kev"
    )
    .map_err(|e| AppError::input(format!("Failed to write peaks CSV header: {e}")))?;

    for (i, comp) in fit.components.iter().enumerate() {
        let energy = cal
            .map(|c| format!("{:.4}", c.energy_from_channel(comp.mean)))
            .unwrap_or_default();
        writeln!(
            file,
            "{spectrum_name},{},{:.4},{:.4},{:.4},{:.4},{:.4},{energy}",
            i + 1,
            comp.mean,
            comp.sigma(),
            comp.amplitude,
            comp.variance,
            comp.fwhm(),
        )
        .map_err(|e| AppError::input(format!("Failed to write peaks CSV row: {e}")))?;
    }

    Ok(())
}

/// The portable JSON representation of an energy calibration: the fitted line
/// plus the points it went through.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationFile {
    pub tool: String,
    pub calibration: EnergyCalibration,
    pub points: Vec<CalibrationPoint>,
}

/// Write the calibration JSON file.
pub fn write_calibration_json(
    path: &Path,
    cal: &EnergyCalibration,
    points: &[CalibrationPoint],
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!(
            "Failed to create calibration JSON '{}': {e}",
            path.display()
        ))
    })?;

    let out = CalibrationFile {
        tool: "nuclab".to_string(),
        calibration: *cal,
        points: points.to_vec(),
    };

    serde_json::to_writer_pretty(file, &out)
        .map_err(|e| AppError::input(format!("Failed to write calibration JSON: {e}")))?;

    Ok(())
}
