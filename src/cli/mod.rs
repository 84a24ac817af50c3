//! Command-line parsing for the HPGe spectroscopy toolkit.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the fitting/math code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::activity::DEFAULT_WINDOW_TOL;
use crate::data::SynthPeak;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "nuclab", version, about = "HPGe gamma spectroscopy: peak fits, calibration, activities")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit Gaussian peaks in a single .Spe spectrum.
    Peaks(PeaksArgs),
    /// Run the full energy calibration over the three sealed sources.
    Calibrate(CalibrateArgs),
    /// Calibrate, then measure activities and identify the unknown source.
    Activity(ActivityArgs),
    /// Fit the BiPo-212 delay-coincidence decay curve.
    Bipo(BipoArgs),
    /// Generate a synthetic .Spe spectrum with Poisson noise.
    Synth(SynthArgs),
}

/// Options for fitting one spectrum.
#[derive(Debug, Parser, Clone)]
pub struct PeaksArgs {
    /// The .Spe file to fit.
    pub file: PathBuf,

    /// Number of peaks to fit (all-or-nothing).
    #[arg(short = 'n', long, default_value_t = 1)]
    pub n_peaks: usize,

    /// Minimum topographic prominence for a candidate peak.
    #[arg(long, default_value_t = 100.0)]
    pub prominence: f64,

    /// Minimum half-prominence width (channels) for a candidate peak.
    #[arg(long, default_value_t = 5.0)]
    pub min_width: f64,

    /// Width of each background sampling band beside a peak (channels).
    #[arg(long, default_value_t = 70.0)]
    pub background_halfwidth: f64,

    /// Write SVG diagnostics into this directory.
    #[arg(long)]
    pub plot_dir: Option<PathBuf>,

    /// Export fitted peak parameters to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Options for the energy calibration run.
#[derive(Debug, Parser, Clone)]
pub struct CalibrateArgs {
    /// Directory holding the standard .Spe dataset.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Write SVG diagnostics into this directory.
    #[arg(long)]
    pub plot_dir: Option<PathBuf>,

    /// Export per-source peak parameters to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the calibration line and points to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

/// Options for the activity run.
#[derive(Debug, Parser, Clone)]
pub struct ActivityArgs {
    /// Directory holding the standard .Spe dataset.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Write SVG diagnostics into this directory.
    #[arg(long)]
    pub plot_dir: Option<PathBuf>,

    /// Half-width (channels) of the summation window around each peak.
    #[arg(long, default_value_t = DEFAULT_WINDOW_TOL)]
    pub tol: usize,

    /// Decay-correct known activities to this date (YYYY-MM-DD); defaults to
    /// the acquisition date of the lab dataset.
    #[arg(long)]
    pub asof: Option<NaiveDate>,
}

/// Options for the BiPo decay fit.
#[derive(Debug, Parser, Clone)]
pub struct BipoArgs {
    /// Write SVG diagnostics into this directory.
    #[arg(long)]
    pub plot_dir: Option<PathBuf>,
}

/// Options for synthetic spectrum generation.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output .Spe path.
    pub out: PathBuf,

    /// Number of channels.
    #[arg(long, default_value_t = 8191)]
    pub n_channels: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Flat background level (expected counts per channel).
    #[arg(long, default_value_t = 20.0)]
    pub flat_level: f64,

    /// Live time written into the header, seconds.
    #[arg(long, default_value_t = 180.0)]
    pub live_time: f64,

    /// A peak as "amplitude,mean,variance"; repeat for several peaks.
    /// Defaults to two reference peaks when omitted.
    #[arg(long = "peak", value_parser = parse_peak)]
    pub peaks: Vec<SynthPeak>,
}

/// Parse `"amplitude,mean,variance"` into a [`SynthPeak`].
fn parse_peak(s: &str) -> Result<SynthPeak, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected 'amplitude,mean,variance', got '{s}'"));
    }
    let parse = |name: &str, v: &str| -> Result<f64, String> {
        v.parse::<f64>()
            .map_err(|_| format!("invalid {name} '{v}' in '{s}'"))
    };
    Ok(SynthPeak {
        amplitude: parse("amplitude", parts[0])?,
        mean: parse("mean", parts[1])?,
        variance: parse("variance", parts[2])?,
    })
}
