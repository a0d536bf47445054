//! Mathematical utilities: least squares, Levenberg–Marquardt, interpolation.

pub mod interp;
pub mod lm;
pub mod ols;

pub use interp::*;
pub use lm::*;
pub use ols::*;
