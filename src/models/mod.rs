//! Seasonal model definitions.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic over built-in and user-supplied forms.

pub mod custom;
pub mod model;

pub use custom::*;
pub use model::*;
