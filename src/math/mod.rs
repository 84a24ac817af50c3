//! Mathematical utilities: linear least squares, polynomial fits, and the
//! Levenberg–Marquardt nonlinear solver.

pub mod lm;
pub mod ols;
pub mod poly;

pub use lm::*;
pub use ols::*;
pub use poly::*;
