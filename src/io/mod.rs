//! Input/output helpers.
//!
//! - fixed-layout `.Spe` spectrum files (`spe`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
pub mod spe;

pub use export::*;
pub use spe::*;
