//! Mathematical utilities: the Landau density and linear least squares.

pub mod landau;
pub mod ols;

pub use landau::*;
pub use ols::*;
