//! Top-level application orchestration.
//!
//! `src/main.rs` only maps the result to an exit code; this module:
//! - parses CLI arguments
//! - sets up logging
//! - runs the combination and fits
//! - writes the fake-rate JSON, plots and the generated macro
//! - assembles the MVA-MET sequence

use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use crate::cli::{AllArgs, CombineArgs, Command, GenerateArgs, MetArgs};
use crate::codegen::{FunctionSet, render_macro, write_macro};
use crate::domain::{CombineConfig, InputFiles, builtin_catalog, load_catalog, validate_catalog};
use crate::error::AppError;
use crate::hist::RootSource;
use crate::io::{read_fake_rates_json, write_fake_rates_json};
use crate::met::{assemble_mva_met_sequence, load_recipe};

pub mod pipeline;

/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "FAKERATES_LOG";

/// Entry point for the `fakerates` binary.
pub fn run() -> Result<(), AppError> {
    // `fakerates` with no subcommand runs the whole chain, so rewrite argv
    // before clap sees it.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    init_logging(cli.verbose);

    match cli.command {
        Command::Combine(args) => handle_combine(&args).map(|_| ()),
        Command::Generate(args) => handle_generate(&args),
        Command::MetSequence(args) => handle_met_sequence(&args),
        Command::All(args) => handle_all(&args),
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let env = Env::default().filter_or(LOG_ENV, log_level(verbose));
    // Already initialised when embedded in another binary.
    let _ = env_logger::try_init_from_env(env);
}

/// Build the pipeline configuration from CLI arguments.
pub fn combine_config_from_args(args: &CombineArgs) -> Result<CombineConfig, AppError> {
    let catalog = match &args.objects {
        Some(path) => {
            info!("Loading object catalog from {}", path.display());
            load_catalog(path)?
        }
        None => builtin_catalog(),
    };
    validate_catalog(&catalog)?;

    Ok(CombineConfig {
        files: InputFiles {
            singlemu: args.singlemu.clone(),
            trilepton: args.trilepton.clone(),
        },
        data_set: args.data_set.clone(),
        catalog,
        output: args.output.clone(),
        plot_dir: (!args.no_plots).then(|| args.plot_dir.clone()),
    })
}

fn handle_combine(args: &CombineArgs) -> Result<CombineConfig, AppError> {
    let config = combine_config_from_args(args)?;
    let mut source = RootSource::new();
    let output = pipeline::run_combine(&config, &mut source)?;

    if let Some(dir) = &config.plot_dir {
        for object in &output.objects {
            let written = crate::plot::render_object_plots(dir, object)?;
            info!("{}: wrote {} plots to {}", object.name, written.len(), dir.display());
        }
    }

    info!("Saving fake rate results to {}", config.output.display());
    write_fake_rates_json(&config.output, &output.fake_rates)?;

    println!("{}", crate::report::format_run_summary(&output, &config));
    Ok(config)
}

fn generate(input: &std::path::Path, macro_path: &std::path::Path) -> Result<(), AppError> {
    let fake_rates = read_fake_rates_json(input)?;
    let set = FunctionSet::from_fake_rates(&fake_rates)?;
    let text = render_macro(&set, Utc::now());
    info!("Writing {} functions to {}", set.functions.len(), macro_path.display());
    write_macro(macro_path, &text)
}

fn handle_generate(args: &GenerateArgs) -> Result<(), AppError> {
    generate(&args.input, &args.macro_path)
}

fn handle_met_sequence(args: &MetArgs) -> Result<(), AppError> {
    let recipe = load_recipe(&args.recipe)?;
    let sequence = assemble_mva_met_sequence(recipe.as_ref());
    if sequence.is_empty() {
        warn!("Empty MVA-MET sequence");
    }
    for module in &sequence.modules {
        println!("{module}\n");
    }
    println!("{sequence}");
    Ok(())
}

fn handle_all(args: &AllArgs) -> Result<(), AppError> {
    let config = handle_combine(&args.combine)?;
    generate(&config.output, &args.macro_path)
}

const SUBCOMMANDS: [&str; 4] = ["combine", "generate", "met-sequence", "all"];

fn is_verbose_flag(arg: &str) -> bool {
    arg == "--verbose" || (arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v'))
}

/// Rewrite argv so `fakerates` defaults to `fakerates all`.
///
/// Only the first token after any leading `-v` flags is inspected, so option
/// values that happen to equal a subcommand name are left alone.
///
/// Rules:
/// - `fakerates`                     -> `fakerates all`
/// - `fakerates --dataset 2012 ...`  -> `fakerates all --dataset 2012 ...`
/// - `fakerates --help/--version/-h` -> unchanged
/// - `fakerates -v combine ...`      -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let first = argv.iter().skip(1).position(|a| !is_verbose_flag(a)).map(|i| i + 1);
    let Some(first) = first else {
        argv.insert(1.min(argv.len()), "all".to_string());
        return argv;
    };

    let arg = argv[first].as_str();
    let is_top_level_help_or_version = matches!(arg, "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version || SUBCOMMANDS.contains(&arg) {
        return argv;
    }

    if arg.starts_with('-') {
        argv.insert(1, "all".to_string());
    }
    argv
}
