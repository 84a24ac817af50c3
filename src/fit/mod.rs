//! Peak detection and nonlinear fitting.
//!
//! - candidate scan (local maxima + prominence/width filters) (`detect`)
//! - background band masking and quadratic background fit (`background`)
//! - Gaussian-sum model and its Jacobian (`gaussian`)
//! - the all-or-nothing multi-peak fit (`peaks`)
//! - delay-coincidence exponential fit (`decay`)

pub mod background;
pub mod decay;
pub mod detect;
pub mod gaussian;
pub mod peaks;

pub use background::*;
pub use decay::*;
pub use detect::*;
pub use gaussian::*;
pub use peaks::*;
