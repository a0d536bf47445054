//! Calendar completion and gap summaries.

pub mod completion;
pub mod gaps;

pub use completion::*;
pub use gaps::*;
