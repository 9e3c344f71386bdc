//! Histogram data, efficiency graphs and histogram sources.

pub mod efficiency;
pub mod histogram;
pub mod source;

pub use efficiency::*;
pub use histogram::*;
pub use source::*;
