//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - object and channel configuration (`ObjectConfig`, `ChannelScenario`)
//! - the built-in object catalog and its eta split
//! - persisted fit results (`ObjectResult`, `FakeRateFile`)

pub mod catalog;
pub mod types;

pub use catalog::*;
pub use types::*;
