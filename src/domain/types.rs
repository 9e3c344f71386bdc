//! Shared domain types.
//!
//! Configuration types (`ObjectConfig`, `ChannelScenario`) deserialize from the
//! `--objects` JSON file; result types (`ObjectResult`, `FakeRateFile`) are the
//! content of `fake_rates.json`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::FitFunction;

/// Which input file a channel is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    /// Single-muon triggered data (`results_singleMuFakeRates.root`).
    SingleMu,
    /// Trilepton control regions (`results_fakeRates.root`).
    Trilepton,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::SingleMu => write!(f, "singlemu"),
            FileRole::Trilepton => write!(f, "trilepton"),
        }
    }
}

/// One control region measuring a fake rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelScenario {
    /// Plot title (ROOT LaTeX syntax).
    pub title: String,
    pub file: FileRole,
    /// Histogram stem; the stored objects are `<dataset>_<histo>_data_num/denom`.
    pub histo: String,
    /// Bin grouping factor for the per-channel efficiency.
    pub rebin: usize,
    /// Excluded channels are reported but not combined.
    #[serde(default)]
    pub exclude: bool,
}

/// How to combine and fit one fake-rate object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub scenarios: BTreeMap<String, ChannelScenario>,
    /// Bin grouping factor for the combined efficiency.
    pub rebin: usize,
    #[serde(default)]
    pub function: FitFunction,
    pub label: String,
    pub fit_label: String,
}

/// Object name -> configuration.
pub type ObjectCatalog = BTreeMap<String, ObjectConfig>;

/// Paths of the two input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFiles {
    pub singlemu: PathBuf,
    pub trilepton: PathBuf,
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            singlemu: PathBuf::from("results_singleMuFakeRates.root"),
            trilepton: PathBuf::from("results_fakeRates.root"),
        }
    }
}

impl InputFiles {
    pub fn path(&self, role: FileRole) -> &PathBuf {
        match role {
            FileRole::SingleMu => &self.singlemu,
            FileRole::Trilepton => &self.trilepton,
        }
    }
}

/// A full `combine` run's configuration as understood by the pipeline.
#[derive(Debug, Clone)]
pub struct CombineConfig {
    pub files: InputFiles,
    /// Data-taking period prefix of the histogram names.
    pub data_set: String,
    pub catalog: ObjectCatalog,
    pub output: PathBuf,
    /// `None` disables image output.
    pub plot_dir: Option<PathBuf>,
}

pub const DEFAULT_DATA_SET: &str = "2011AB";
pub const DEFAULT_FAKE_RATES_JSON: &str = "fake_rates.json";
pub const DEFAULT_FAKE_RATES_MACRO: &str = "fake_rates.C";
pub const DEFAULT_PLOT_DIR: &str = "plots/combineFakeRates";

/// Per-channel numbers reported for every object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub num: f64,
    pub denom: f64,
    /// `max(non-empty numerator bins - 3, 1)`
    pub ndof: usize,
    /// Chi-square of the channel efficiency against the least-squares curve
    /// divided by `ndof`.
    pub chi2_ndf: f64,
}

/// Likelihood-fit parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitVars {
    pub scale: f64,
    pub mu: f64,
    pub sigma: f64,
    pub offset: f64,
}

impl FitVars {
    pub fn from_params(p: &[f64; 4]) -> Self {
        Self {
            scale: p[0],
            mu: p[1],
            sigma: p[2],
            offset: p[3],
        }
    }

    pub fn to_params(self) -> [f64; 4] {
        [self.scale, self.mu, self.sigma, self.offset]
    }
}

/// Persisted fit result for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectResult {
    pub types: BTreeMap<String, ChannelSummary>,
    pub combined_num: f64,
    pub combined_denom: f64,
    pub combined_eff: f64,
    pub vars: FitVars,
    pub fit_status: i32,
    pub raw_func: String,
    pub fitted_func: String,
}

/// Content of `fake_rates.json`: object name -> result.
pub type FakeRateFile = BTreeMap<String, ObjectResult>;
