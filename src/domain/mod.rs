//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - recognized measurement columns (`Field`)
//! - observation rows and tables (`WeatherRecord`, `WeatherTable`)
//! - calendar-completed rows (`CalendarRow`, `CalendarTable`) and the shared
//!   missingness predicate

pub mod types;

pub use types::*;
