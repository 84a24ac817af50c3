//! `nuclab` library crate.
//!
//! The binary (`nuclab`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., future batch drivers, notebooks, etc.)
//! - code stays easy to navigate as the project grows

pub mod activity;
pub mod app;
pub mod calib;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
