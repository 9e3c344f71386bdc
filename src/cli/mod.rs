//! Command-line parsing for the fake-rate tools.
//!
//! Parsing stays separate from dispatch (`app`) and from the analysis code.
//! Every flag only overrides a default; running with no arguments works on
//! the standard file names in the current directory.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_DATA_SET, DEFAULT_FAKE_RATES_JSON, DEFAULT_FAKE_RATES_MACRO, DEFAULT_PLOT_DIR};

/// Default MVA-MET recipe file.
pub const DEFAULT_RECIPE: &str = "mvaPFMET_leptons.json";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fakerates", version, about = "Jet fake-rate combination, fitting and code generation")]
pub struct Cli {
    /// Raise the log level (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Combine channels, fit every object and write the fake-rate JSON and plots.
    Combine(CombineArgs),
    /// Generate the C++ fake-rate macro from the fake-rate JSON.
    Generate(GenerateArgs),
    /// Print the MVA-MET sequence assembled from a recipe file.
    MetSequence(MetArgs),
    /// `combine` followed by `generate` (the default).
    All(AllArgs),
}

/// Options of the combination step.
#[derive(Debug, Args, Clone)]
pub struct CombineArgs {
    /// Single-muon input file.
    #[arg(long, default_value = "results_singleMuFakeRates.root")]
    pub singlemu: PathBuf,

    /// Trilepton input file.
    #[arg(long, default_value = "results_fakeRates.root")]
    pub trilepton: PathBuf,

    /// Data-set prefix of the histogram names.
    #[arg(long = "dataset", default_value = DEFAULT_DATA_SET)]
    pub data_set: String,

    /// Fake-rate JSON to write.
    #[arg(short, long, default_value = DEFAULT_FAKE_RATES_JSON)]
    pub output: PathBuf,

    /// Directory for the SVG plots.
    #[arg(long, default_value = DEFAULT_PLOT_DIR)]
    pub plot_dir: PathBuf,

    /// Skip image output.
    #[arg(long)]
    pub no_plots: bool,

    /// Object catalog JSON replacing the built-in one.
    #[arg(long, value_name = "JSON")]
    pub objects: Option<PathBuf>,
}

/// Options of the code-generation step.
#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Fake-rate JSON to read.
    #[arg(short, long, default_value = DEFAULT_FAKE_RATES_JSON)]
    pub input: PathBuf,

    /// C++ macro to write.
    #[arg(long = "macro", default_value = DEFAULT_FAKE_RATES_MACRO)]
    pub macro_path: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct MetArgs {
    /// MVA-MET recipe JSON.
    #[arg(long, default_value = DEFAULT_RECIPE)]
    pub recipe: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct AllArgs {
    #[command(flatten)]
    pub combine: CombineArgs,

    /// C++ macro to write.
    #[arg(long = "macro", default_value = DEFAULT_FAKE_RATES_MACRO)]
    pub macro_path: PathBuf,
}
