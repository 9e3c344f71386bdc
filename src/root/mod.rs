//! Minimal native reader for 1D histograms stored in ROOT files.
//!
//! Supports TH1D/TH1F keys in the top directory or in sub-directories,
//! uncompressed or zlib/LZ4 compressed. Trees and other classes are not read.

mod decompress;
mod directory;
mod error;
mod file;
mod key;
mod rbuffer;
mod th1;

pub use error::{Result, RootError};
pub use file::{KeyInfo, RootFile};
