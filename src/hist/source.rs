//! Where histograms come from.
//!
//! The pipeline asks a `HistogramSource` for `(file, name)` pairs. The
//! production source reads ROOT files (each opened once per run); tests use an
//! in-memory map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::AppError;
use crate::hist::Histogram;
use crate::root::RootFile;

pub trait HistogramSource {
    /// Fetch histogram `name` from `file`. A missing file or object is an error.
    fn histogram(&mut self, file: &Path, name: &str) -> Result<Histogram, AppError>;
}

/// Reads histograms from ROOT files, caching each opened file.
#[derive(Default)]
pub struct RootSource {
    files: HashMap<PathBuf, RootFile>,
}

impl RootSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistogramSource for RootSource {
    fn histogram(&mut self, file: &Path, name: &str) -> Result<Histogram, AppError> {
        if !self.files.contains_key(file) {
            debug!("Opening {}", file.display());
            let opened = RootFile::open(file)
                .map_err(|e| AppError::from(e).context(format!("Failed to open '{}'", file.display())))?;
            self.files.insert(file.to_path_buf(), opened);
        }
        let root = self
            .files
            .get(file)
            .ok_or_else(|| AppError::new(2, format!("File '{}' not cached.", file.display())))?;
        root.get_histogram(name)
            .map_err(|e| AppError::from(e).context(format!("'{}' in '{}'", name, root.path().display())))
    }
}

/// In-memory histograms keyed by `(file, name)`.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    histograms: HashMap<(PathBuf, String), Histogram>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<PathBuf>, histogram: Histogram) {
        self.histograms
            .insert((file.into(), histogram.name.clone()), histogram);
    }
}

impl HistogramSource for MemorySource {
    fn histogram(&mut self, file: &Path, name: &str) -> Result<Histogram, AppError> {
        self.histograms
            .get(&(file.to_path_buf(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                AppError::new(
                    2,
                    format!("Histogram '{name}' not found in '{}'.", file.display()),
                )
            })
    }
}
