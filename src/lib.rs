//! `vh-fakerates` library crate.
//!
//! The binary (`fakerates`) is a thin wrapper around this library so that
//! the combination, fits and code generation are testable without spawning
//! processes or touching real ROOT files.

pub mod app;
pub mod cli;
pub mod codegen;
pub mod domain;
pub mod error;
pub mod fit;
pub mod hist;
pub mod io;
pub mod math;
pub mod met;
pub mod models;
pub mod plot;
pub mod report;
pub mod root;
