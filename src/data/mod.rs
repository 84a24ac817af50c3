//! The lab's standard dataset: which `.Spe` file belongs to which source and
//! how its peaks are searched for, plus data-directory resolution.

use std::path::{Path, PathBuf};

use crate::domain::{NuclideId, PeakSearch, Spectrum};
use crate::error::AppError;
use crate::io::spe::read_spectrum;

pub mod synth;

pub use synth::*;

pub const CO60_FILE: &str = "frun3_co60_live180s.Spe";
pub const BA133_FILE: &str = "frun1_ba133_live180s.Spe";
pub const NA22_FILE: &str = "frun2_na22_live180s.Spe";
pub const UNKNOWN_FILE: &str = "frun4_source_live5400s.Spe";
pub const BKG_FILE: &str = "frun5_bkg_live5400s.Spe";

/// How one calibration source is searched and which fitted components feed
/// the energy calibration.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub nuclide: NuclideId,
    pub filename: &'static str,
    pub search: PeakSearch,
    /// Indices (selection order) of the components to keep; `None` keeps all.
    pub keep: Option<&'static [usize]>,
}

/// The standard calibration plan for the three sealed sources.
pub fn calibration_plans() -> Vec<SourcePlan> {
    vec![
        SourcePlan {
            nuclide: NuclideId::Co60,
            filename: CO60_FILE,
            search: PeakSearch::new(2).background_halfwidth(100.0),
            keep: None,
        },
        SourcePlan {
            nuclide: NuclideId::Ba133,
            filename: BA133_FILE,
            search: PeakSearch::new(5).background_halfwidth(70.0),
            keep: None,
        },
        // The 511 keV annihilation line dominates the Na-22 spectrum; fit two
        // peaks and keep only the 1274.5 keV gamma.
        SourcePlan {
            nuclide: NuclideId::Na22,
            filename: NA22_FILE,
            search: PeakSearch::new(2).background_halfwidth(400.0),
            keep: Some(&[1]),
        },
    ]
}

/// Search parameters for the unknown sample.
pub fn unknown_search() -> PeakSearch {
    PeakSearch::new(1).background_halfwidth(100.0)
}

pub fn load_source(data_dir: &Path, plan: &SourcePlan) -> Result<Spectrum, AppError> {
    read_spectrum(
        &data_dir.join(plan.filename),
        plan.nuclide.name(),
        plan.nuclide.label(),
    )
}

pub fn load_unknown(data_dir: &Path) -> Result<Spectrum, AppError> {
    read_spectrum(&data_dir.join(UNKNOWN_FILE), "x", "unknown source")
}

pub fn load_background(data_dir: &Path) -> Result<Spectrum, AppError> {
    read_spectrum(&data_dir.join(BKG_FILE), "bkg", "background")
}

/// Resolve the data directory: explicit flag, then `NUCLAB_DATA_DIR` (with
/// `.env` honored), then `./data`.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }

    // A missing .env file is fine; only explicit configuration matters.
    let _ = dotenvy::dotenv();

    std::env::var("NUCLAB_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}
