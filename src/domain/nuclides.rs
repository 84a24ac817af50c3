//! Tabulated reference data for the calibration sources.
//!
//! Peak energies and emission intensities are the standard library values for
//! the lab's sealed sources. Reference activities are the manufacturer's
//! certificate values at the certificate date; `activity::decayed_activity`
//! corrects them to the measurement date.

use chrono::NaiveDate;

/// The calibration sources available in the lab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NuclideId {
    Co60,
    Ba133,
    Na22,
}

impl NuclideId {
    pub const ALL: [NuclideId; 3] = [NuclideId::Co60, NuclideId::Ba133, NuclideId::Na22];

    /// Short name used in filenames and reports.
    pub fn name(self) -> &'static str {
        match self {
            NuclideId::Co60 => "Co60",
            NuclideId::Ba133 => "Ba133",
            NuclideId::Na22 => "Na22",
        }
    }

    /// Display label for plots.
    pub fn label(self) -> &'static str {
        match self {
            NuclideId::Co60 => "60Co",
            NuclideId::Ba133 => "133Ba",
            NuclideId::Na22 => "22Na",
        }
    }

    pub fn data(self) -> Nuclide {
        match self {
            NuclideId::Co60 => Nuclide {
                id: self,
                peaks_kev: vec![1173.288, 1332.492],
                intensities: vec![99.85, 99.9826],
                half_life_days: 1925.28,
                reference: ReferenceActivity {
                    bq: 3.7e5,
                    date: NaiveDate::from_ymd_opt(1977, 4, 28).expect("valid date"),
                    rel_uncertainty: 0.03,
                },
            },
            NuclideId::Ba133 => Nuclide {
                id: self,
                peaks_kev: vec![80.9979, 276.3989, 302.8508, 356.0129, 383.8485],
                intensities: vec![32.9, 7.16, 18.34, 62.05, 8.94],
                half_life_days: 10.551 * 365.0,
                reference: ReferenceActivity {
                    bq: 3.81e5,
                    date: NaiveDate::from_ymd_opt(2003, 3, 30).expect("valid date"),
                    rel_uncertainty: 0.03,
                },
            },
            NuclideId::Na22 => Nuclide {
                id: self,
                peaks_kev: vec![1274.5],
                intensities: vec![99.94],
                half_life_days: 2.6018 * 365.0,
                reference: ReferenceActivity {
                    bq: 37e3,
                    date: NaiveDate::from_ymd_opt(2020, 2, 12).expect("valid date"),
                    rel_uncertainty: 0.2,
                },
            },
        }
    }
}

/// Certificate activity at a reference date.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceActivity {
    pub bq: f64,
    pub date: NaiveDate,
    /// Relative uncertainty of the certificate value.
    pub rel_uncertainty: f64,
}

/// Tabulated data for one source.
#[derive(Debug, Clone)]
pub struct Nuclide {
    pub id: NuclideId,
    /// Gamma line energies, keV, ascending.
    pub peaks_kev: Vec<f64>,
    /// Emission intensities per 100 decays, same order as `peaks_kev`.
    pub intensities: Vec<f64>,
    pub half_life_days: f64,
    pub reference: ReferenceActivity,
}
