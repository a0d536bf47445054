//! Input/output helpers.
//!
//! - CSV ingest + header normalization (`ingest`)
//! - result exports: CSV with metadata header, fit JSON (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
