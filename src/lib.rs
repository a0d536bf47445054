//! `weather-curves` library crate.
//!
//! Daily weather cleaning and seasonal curve fitting:
//!
//! - calendar completion and gap summaries (`calendar`)
//! - bounded gap filling (`impute`)
//! - rule-based quality checks (`validate`)
//! - nonlinear seasonal fits over day-of-year means (`models`, `fit`)
//! - temperature-shift and rainfall-resampling scenarios (`scenario`)
//!
//! The binary (`wx`) is a thin wrapper around this library so that core logic
//! is testable without spawning processes.

pub mod app;
pub mod calendar;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod impute;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod scenario;
pub mod validate;
