//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during detection and fitting
//! - exported to CSV/JSON
//! - reused by plotting and reporting without extra conversions

pub mod nuclides;
pub mod types;

pub use nuclides::*;
pub use types::*;
