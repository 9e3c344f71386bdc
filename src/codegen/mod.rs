//! `fake_rates.json` -> `fake_rates.C` code generation.

pub mod functions;
pub mod render;

pub use functions::*;
pub use render::*;
