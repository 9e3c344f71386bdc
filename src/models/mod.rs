//! Fake-rate model implementations.
//!
//! Models are small, pure functions so that fitting code can stay generic.

pub mod model;

pub use model::*;
