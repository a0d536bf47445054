//! Derived and synthetic input data.

pub mod photoperiod;
pub mod sample;

pub use photoperiod::*;
pub use sample::*;
