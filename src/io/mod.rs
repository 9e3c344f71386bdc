//! Input/output helpers.
//!
//! - fake-rate JSON read/write (`fake_rates`)

pub mod fake_rates;

pub use fake_rates::*;
