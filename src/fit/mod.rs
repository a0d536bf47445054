//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit a single model with Levenberg–Marquardt (`fitter`)
//! - aggregate daily series by day-of-year and fit a batch of models,
//!   tolerating individual failures (`seasonal`)

pub mod fitter;
pub mod seasonal;

pub use fitter::*;
pub use seasonal::*;
