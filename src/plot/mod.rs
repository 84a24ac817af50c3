//! SVG diagnostics rendered with Plotters.
//!
//! Rendering is strictly a presentation concern: every function takes already
//! computed results and draws them, nothing here feeds back into the fits.
//! The peak-fit diagnostic is wired into the pipeline through the
//! [`FitObserver`] hook.

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::domain::{CalibrationPoint, DecayFit, EnergyCalibration, PeakFit, Spectrum};
use crate::error::AppError;
use crate::fit::peaks::FitObserver;
use crate::math::poly::polyval;

/// Observer that writes one `peaks_<name>.svg` per fitted spectrum.
pub struct SvgReporter {
    out_dir: PathBuf,
}

impl SvgReporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl FitObserver for SvgReporter {
    fn on_fit(&self, spectrum: &Spectrum, fit: &PeakFit) {
        let path = self.out_dir.join(format!("peaks_{}.svg", spectrum.name));
        // Diagnostics must never fail the fit itself.
        if let Err(e) = render_peak_fit(&path, spectrum, fit) {
            eprintln!("warning: {e}");
        }
    }
}

/// Spectrum, background curve, fitted model, center markers, and the shaded
/// background sampling bands.
pub fn render_peak_fit(path: &Path, spectrum: &Spectrum, fit: &PeakFit) -> Result<(), AppError> {
    draw_peak_fit(path, spectrum, fit)
        .map_err(|e| AppError::input(format!("Failed to render '{}': {e}", path.display())))
}

fn draw_peak_fit(
    path: &Path,
    spectrum: &Spectrum,
    fit: &PeakFit,
) -> Result<(), Box<dyn std::error::Error>> {
    let n = spectrum.n_channels() as f64;

    // Zoom to the fitted region: a quarter of its span as margin beyond the
    // outermost background bands.
    let (mut x0, mut x1) = fit
        .background_bands
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(a, b)| {
            (lo.min(a), hi.max(b))
        });
    if !(x0.is_finite() && x1.is_finite() && x1 > x0) {
        x0 = 0.0;
        x1 = n;
    }
    let margin = 0.25 * (x1 - x0);
    let x0 = (x0 - margin).max(0.0);
    let x1 = (x1 + margin).min(n);

    let y_max = spectrum
        .counts
        .iter()
        .enumerate()
        .filter(|(ch, _)| (*ch as f64) >= x0 && (*ch as f64) < x1)
        .map(|(_, &c)| c as f64)
        .fold(1.0f64, f64::max);

    let root = SVGBackend::new(path, (1400, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(format!("Peak fit: {}", spectrum.label), ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x0..x1, 0.0..1.1 * y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("channel")
        .y_desc("counts")
        .label_style(("sans-serif", 14).into_font())
        .draw()?;

    // Shaded background sampling bands first, so the data draws on top.
    chart.draw_series(fit.background_bands.iter().map(|&(a, b)| {
        Rectangle::new([(a, 0.0), (b, 1.1 * y_max)], MAGENTA.mix(0.12).filled())
    }))?;

    let channels = || {
        (x0.floor() as usize..(x1.ceil() as usize).min(spectrum.n_channels()))
            .map(|ch| ch as f64)
    };

    chart
        .draw_series(LineSeries::new(
            channels().map(|x| (x, spectrum.counts[x as usize] as f64)),
            &BLUE,
        ))?
        .label(spectrum.label.clone())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(
            channels().map(|x| (x, fit.background_curve[x as usize])),
            &GREEN,
        ))?
        .label("background fit")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    chart
        .draw_series(LineSeries::new(
            channels().map(|x| (x, fit.model(x) + fit.background_curve[x as usize])),
            &RED,
        ))?
        .label("Gaussian peak fit")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    // Fitted center markers.
    chart.draw_series(fit.centers().into_iter().map(|c| {
        PathElement::new(vec![(c, 0.0), (c, 1.1 * y_max)], RED.stroke_width(1))
    }))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 16))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Calibration scatter (fitted centers vs. known energies) plus the line.
pub fn render_calibration(
    path: &Path,
    points: &[CalibrationPoint],
    cal: &EnergyCalibration,
) -> Result<(), AppError> {
    draw_calibration(path, points, cal)
        .map_err(|e| AppError::input(format!("Failed to render '{}': {e}", path.display())))
}

fn draw_calibration(
    path: &Path,
    points: &[CalibrationPoint],
    cal: &EnergyCalibration,
) -> Result<(), Box<dyn std::error::Error>> {
    let x_max = points.iter().map(|p| p.channel).fold(1.0f64, f64::max) * 1.1;
    let y_max = points.iter().map(|p| p.energy_kev).fold(1.0f64, f64::max) * 1.1;

    let root = SVGBackend::new(path, (900, 900)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("Energy calibration", ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("measured channel (mean of Gaussian fit)")
        .y_desc("known energy [keV]")
        .label_style(("sans-serif", 14).into_font())
        .draw()?;

    chart.draw_series(LineSeries::new(
        (0..=100).map(|i| {
            let x = x_max * i as f64 / 100.0;
            (x, cal.energy_from_channel(x))
        }),
        &BLUE,
    ))?;

    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new((p.channel, p.energy_kev), 4, BLACK.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Measured window rates vs. known activities, with the activity line.
pub fn render_activity_line(
    path: &Path,
    measured_known: &[(f64, f64)],
    line: &[f64; 2],
) -> Result<(), AppError> {
    draw_activity_line(path, measured_known, line)
        .map_err(|e| AppError::input(format!("Failed to render '{}': {e}", path.display())))
}

fn draw_activity_line(
    path: &Path,
    measured_known: &[(f64, f64)],
    line: &[f64; 2],
) -> Result<(), Box<dyn std::error::Error>> {
    let x_min = measured_known.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = measured_known.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_max = measured_known.iter().map(|p| p.1).fold(1.0f64, f64::max);
    let pad = 0.05 * (x_max - x_min).max(1.0);

    let root = SVGBackend::new(path, (900, 900)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("Activity calibration", ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d((x_min - pad)..(x_max + pad), 0.0..1.1 * y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("measured window rate [counts/s]")
        .y_desc("known activity [Bq]")
        .label_style(("sans-serif", 14).into_font())
        .draw()?;

    chart.draw_series(LineSeries::new(
        (0..=100).map(|i| {
            let x = (x_min - pad) + (x_max - x_min + 2.0 * pad) * i as f64 / 100.0;
            (x, polyval(line, x))
        }),
        &BLUE,
    ))?;

    chart.draw_series(
        measured_known
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 4, BLACK.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Delay-coincidence points and the fitted exponential.
pub fn render_decay(
    path: &Path,
    points: &[(f64, f64)],
    fit: &DecayFit,
) -> Result<(), AppError> {
    draw_decay(path, points, fit)
        .map_err(|e| AppError::input(format!("Failed to render '{}': {e}", path.display())))
}

fn draw_decay(
    path: &Path,
    points: &[(f64, f64)],
    fit: &DecayFit,
) -> Result<(), Box<dyn std::error::Error>> {
    let t_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let t_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_max = points.iter().map(|p| p.1).fold(1.0f64, f64::max);

    let root = SVGBackend::new(path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("BiPo delay-coincidence fit", ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d((t_min * 0.9)..(t_max * 1.05), 0.0..1.2 * y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("delay [ns]")
        .y_desc("rate [counts/s]")
        .label_style(("sans-serif", 14).into_font())
        .draw()?;

    chart.draw_series(LineSeries::new(
        (0..=200).map(|i| {
            let t = t_min + (t_max - t_min) * i as f64 / 200.0;
            (t, fit.eval(t))
        }),
        &RED,
    ))?;

    chart.draw_series(points.iter().map(|&(t, y)| Circle::new((t, y), 4, BLUE.filled())))?;

    root.present()?;
    Ok(())
}

/// Max-normalized overlay of several spectra.
pub fn render_overlay(path: &Path, spectra: &[&Spectrum]) -> Result<(), AppError> {
    draw_overlay(path, spectra)
        .map_err(|e| AppError::input(format!("Failed to render '{}': {e}", path.display())))
}

fn draw_overlay(path: &Path, spectra: &[&Spectrum]) -> Result<(), Box<dyn std::error::Error>> {
    let n = spectra.iter().map(|s| s.n_channels()).max().unwrap_or(0) as f64;

    let root = SVGBackend::new(path, (1400, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("All spectra (max-normalized)", ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(0.0..n, 0.0..1.05)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("channel")
        .y_desc("counts / max")
        .label_style(("sans-serif", 14).into_font())
        .draw()?;

    for (i, spectrum) in spectra.iter().enumerate() {
        let peak = spectrum.counts.iter().copied().max().unwrap_or(1).max(1) as f64;
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                spectrum
                    .counts
                    .iter()
                    .enumerate()
                    .map(|(ch, &c)| (ch as f64, c as f64 / peak)),
                &color,
            ))?
            .label(spectrum.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 16))
        .draw()?;

    root.present()?;
    Ok(())
}
