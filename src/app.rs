//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads spectra and runs the fit pipeline
//! - prints reports
//! - writes optional plots/exports

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{
    ActivityArgs, BipoArgs, CalibrateArgs, Command, PeaksArgs, SynthArgs,
};
use crate::domain::PeakSearch;
use crate::error::AppError;
use crate::fit::decay::{BIPO_POINTS, DECAY_SEED, fit_decay};
use crate::fit::peaks::{FitObserver, NullObserver, fit_peaks};
use crate::plot::SvgReporter;

pub mod pipeline;

/// Entry point for the `nuclab` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Peaks(args) => handle_peaks(args),
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Activity(args) => handle_activity(args),
        Command::Bipo(args) => handle_bipo(args),
        Command::Synth(args) => handle_synth(args),
    }
}

/// Diagnostic output target for one command invocation: an SVG reporter when
/// a plot directory was requested, a no-op observer otherwise.
struct PlotTarget(Option<SvgReporter>);

impl PlotTarget {
    fn observer(&self) -> &dyn FitObserver {
        match &self.0 {
            Some(svg) => svg,
            None => &NullObserver,
        }
    }
}

/// Create the plot directory (when requested) and hand back the observer to
/// inject into the fits.
fn prepare_plot_dir(dir: &Option<PathBuf>) -> Result<PlotTarget, AppError> {
    match dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| {
                AppError::input(format!(
                    "Failed to create plot directory '{}': {e}",
                    dir.display()
                ))
            })?;
            Ok(PlotTarget(Some(SvgReporter::new(dir.clone()))))
        }
        None => Ok(PlotTarget(None)),
    }
}

fn handle_peaks(args: PeaksArgs) -> Result<(), AppError> {
    let name = args
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spectrum".to_string());
    let spectrum = crate::io::spe::read_spectrum(&args.file, &name, &name)?;

    let search = PeakSearch {
        n_peaks: args.n_peaks,
        prominence_threshold: args.prominence,
        min_width: args.min_width,
        background_halfwidth: args.background_halfwidth,
    };

    let plots = prepare_plot_dir(&args.plot_dir)?;

    let fit = fit_peaks(&spectrum, &search, plots.observer())?;
    println!("{}", crate::report::format_peak_fit(&spectrum, &fit, None));

    if let Some(path) = &args.export {
        crate::io::export::write_peaks_csv(path, &spectrum.name, &fit, None)?;
    }
    Ok(())
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let data_dir = crate::data::resolve_data_dir(args.data_dir);
    let plots = prepare_plot_dir(&args.plot_dir)?;

    let out = pipeline::run_calibration(&data_dir, plots.observer())?;

    for source in &out.fits {
        println!(
            "{}",
            crate::report::format_peak_fit(&source.spectrum, &source.fit, Some(&out.calibration))
        );
    }
    println!(
        "{}",
        crate::report::format_calibration(&out.points, &out.calibration)
    );

    if let Some(dir) = &args.plot_dir {
        crate::plot::render_calibration(
            &dir.join("calibration.svg"),
            &out.points,
            &out.calibration,
        )?;
        let spectra: Vec<&crate::domain::Spectrum> =
            out.fits.iter().map(|s| &s.spectrum).collect();
        crate::plot::render_overlay(&dir.join("spectra.svg"), &spectra)?;
    }

    if let Some(path) = &args.export {
        for source in &out.fits {
            crate::io::export::write_peaks_csv(
                &per_source_path(path, source.nuclide.id.name()),
                source.nuclide.id.name(),
                &source.fit,
                Some(&out.calibration),
            )?;
        }
    }
    if let Some(path) = &args.export_json {
        crate::io::export::write_calibration_json(path, &out.calibration, &out.points)?;
    }
    Ok(())
}

fn handle_activity(args: ActivityArgs) -> Result<(), AppError> {
    let data_dir = crate::data::resolve_data_dir(args.data_dir);
    let asof = args
        .asof
        .unwrap_or_else(crate::activity::default_measurement_date);
    let plots = prepare_plot_dir(&args.plot_dir)?;

    let out = pipeline::run_activity(&data_dir, args.tol, asof, plots.observer())?;

    println!(
        "{}",
        crate::report::format_calibration(&out.calibration.points, &out.calibration.calibration)
    );
    for source in &out.sources {
        println!("{}", crate::report::format_source_activities(source));
    }
    println!(
        "Activity(rate) = {:.4} * rate + {:.4} [Bq]\n",
        out.line[0], out.line[1]
    );
    println!(
        "{}",
        crate::report::format_unknown(
            &out.unknown.fit,
            out.unknown.energy_kev,
            out.unknown.measured.rate,
            out.unknown.measured.uncertainty,
            out.unknown.calibrated_bq,
        )
    );

    if let Some(dir) = &args.plot_dir {
        crate::plot::render_calibration(
            &dir.join("calibration.svg"),
            &out.calibration.points,
            &out.calibration.calibration,
        )?;

        let measured_known: Vec<(f64, f64)> = out
            .sources
            .iter()
            .flat_map(|s| {
                s.estimates
                    .iter()
                    .zip(s.known_bq.iter())
                    .map(|(e, &k)| (e.rate, k))
            })
            .collect();
        crate::plot::render_activity_line(
            &dir.join("activity_line.svg"),
            &measured_known,
            &out.line,
        )?;
    }
    Ok(())
}

fn handle_bipo(args: BipoArgs) -> Result<(), AppError> {
    let fit = fit_decay(&BIPO_POINTS, DECAY_SEED)?;
    println!("{}", crate::report::format_decay(&fit));

    prepare_plot_dir(&args.plot_dir)?;
    if let Some(dir) = &args.plot_dir {
        crate::plot::render_decay(&dir.join("bipo.svg"), &BIPO_POINTS, &fit)?;
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let mut spec = crate::data::SynthSpec {
        n_channels: args.n_channels,
        peaks: args.peaks,
        flat_level: args.flat_level,
        seed: args.seed,
        live_time: args.live_time,
        real_time: args.live_time,
    };
    if spec.peaks.is_empty() {
        spec.peaks = crate::data::SynthSpec::default().peaks;
    }

    let name = args
        .out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "synth".to_string());
    let spectrum = crate::data::generate_spectrum(&spec, &name)?;
    crate::io::spe::write_spectrum(&args.out, &spectrum)?;

    println!(
        "Wrote {} channels ({} peak(s), seed {}) to {}",
        spectrum.n_channels(),
        spec.peaks.len(),
        spec.seed,
        args.out.display()
    );
    Ok(())
}

/// Derive `peaks_Co60.csv` style per-source paths from a base export path.
fn per_source_path(base: &Path, source: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "peaks".to_string());
    let ext = base
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    base.with_file_name(format!("{stem}_{source}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_target_creates_the_directory_and_falls_back_to_noop() {
        let target = prepare_plot_dir(&None).unwrap();
        assert!(target.0.is_none());
        // Still hands out a usable (no-op) observer.
        let _: &dyn FitObserver = target.observer();

        let dir = std::env::temp_dir().join(format!("nuclab_plots_{}", std::process::id()));
        let target = prepare_plot_dir(&Some(dir.clone())).unwrap();
        assert!(dir.is_dir());
        assert!(target.0.is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn per_source_paths_keep_directory_and_extension() {
        let path = per_source_path(Path::new("/tmp/out/peaks.csv"), "Ba133");
        assert_eq!(path, PathBuf::from("/tmp/out/peaks_Ba133.csv"));

        let path = per_source_path(Path::new("peaks"), "Co60");
        assert_eq!(path, PathBuf::from("peaks_Co60.csv"));
    }
}
