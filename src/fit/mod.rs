//! Curve fitting.
//!
//! Responsibilities:
//!
//! - generate the `(mu, sigma)` seed grid
//! - least-squares fit of efficiency graphs (parallel seed scan + L-BFGS)
//! - binomial likelihood fit of pass/fail histograms
//! - bounded L-BFGS minimisation shared by both fits

pub mod grid;
pub mod least_squares;
pub mod likelihood;
pub mod optimizer;

pub use grid::*;
pub use least_squares::*;
pub use likelihood::*;
pub use optimizer::*;
