//! Reader/writer for the instrument's fixed-layout `.Spe` text format.
//!
//! The MCA software writes a line-oriented file with fixed offsets:
//!
//! - line 9 holds `"<live> <real>"` acquisition times in seconds
//! - lines 13..13+8191 hold one integer count per channel
//!
//! Everything else in the header is ignored. The core pipeline never touches
//! files; it receives the validated [`Spectrum`] this module produces.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::Spectrum;
use crate::error::AppError;

/// Channels per acquisition; fixed by the MCA configuration.
pub const N_CHANNELS: usize = 8191;
/// Zero-based index of the `"<live> <real>"` line.
pub const TIME_LINE: usize = 9;
/// Zero-based index of the first count line.
pub const DATA_START_LINE: usize = 13;

/// Read a `.Spe` file into a [`Spectrum`].
pub fn read_spectrum(path: &Path, name: &str, label: &str) -> Result<Spectrum, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::input(format!("Failed to read '{}': {e}", path.display())))?;
    let lines: Vec<&str> = text.lines().collect();

    if lines.len() < DATA_START_LINE + N_CHANNELS {
        return Err(AppError::input(format!(
            "'{}': expected at least {} lines, found {}.",
            path.display(),
            DATA_START_LINE + N_CHANNELS,
            lines.len()
        )));
    }

    let (live_time, real_time) = parse_time_line(lines[TIME_LINE]).map_err(|e| {
        AppError::input(format!(
            "'{}' line {}: {e}",
            path.display(),
            TIME_LINE + 1
        ))
    })?;

    let mut counts = Vec::with_capacity(N_CHANNELS);
    for (offset, line) in lines[DATA_START_LINE..DATA_START_LINE + N_CHANNELS]
        .iter()
        .enumerate()
    {
        let count: u32 = line.trim().parse().map_err(|_| {
            AppError::input(format!(
                "'{}' line {}: invalid count '{}'.",
                path.display(),
                DATA_START_LINE + offset + 1,
                line.trim()
            ))
        })?;
        counts.push(count);
    }

    Ok(Spectrum::new(name, label, counts, live_time, real_time))
}

fn parse_time_line(line: &str) -> Result<(f64, f64), String> {
    let mut parts = line.split_whitespace();
    let live: u64 = parts
        .next()
        .ok_or("missing live time")?
        .parse()
        .map_err(|_| format!("invalid live time in '{}'", line.trim()))?;
    let real: u64 = parts
        .next()
        .ok_or("missing real time")?
        .parse()
        .map_err(|_| format!("invalid real time in '{}'", line.trim()))?;
    Ok((live as f64, real as f64))
}

/// Write a [`Spectrum`] in the same fixed layout `read_spectrum` expects.
///
/// Used by the synthetic-spectrum generator so its output can be fed straight
/// back through the normal pipeline.
pub fn write_spectrum(path: &Path, spectrum: &Spectrum) -> Result<(), AppError> {
    let mut file = fs::File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))?;

    let header = format!(
        "$SPEC_ID:$\n\
         {}\n\
         $SPEC_REM:$\n\
         DET# 1\n\
         DETDESC# HPGe\n\
         AP# nuclab\n\
         $DATE_MEA:$\n\
         03/15/2022 12:00:00\n\
         $MEAS_TIM:$\n\
         {} {}\n\
         $ENER_FIT:$\n\
         0.000000 1.000000\n\
         $DATA:$\n",
        spectrum.name,
        spectrum.live_time.round() as u64,
        spectrum.real_time.round() as u64,
    );
    file.write_all(header.as_bytes())
        .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", path.display())))?;

    for &count in &spectrum.counts {
        writeln!(file, "{count}")
            .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", path.display())))?;
    }

    Ok(())
}
