//! The fake-rate combination pipeline.
//!
//! Per object: fetch every channel's numerator/denominator, combine the
//! non-excluded ones, build efficiencies, run the least-squares and likelihood
//! fits, and summarise everything into an `ObjectResult`.
//!
//! Presentation (JSON, images, terminal output) is left to the caller.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::domain::{
    ChannelScenario, ChannelSummary, CombineConfig, FakeRateFile, FitVars, InputFiles, ObjectConfig,
    ObjectResult,
};
use crate::error::AppError;
use crate::fit::{
    BinomialData, LeastSquaresFit, LeastSquaresOptions, LikelihoodFit, LikelihoodOptions, OBSERVABLE_RANGE,
    fit_least_squares, fit_likelihood,
};
use crate::hist::{EfficiencyGraph, Histogram, HistogramSource};

/// Name of a stored histogram, e.g. `2011AB_mu_data_num`.
pub fn histogram_name(data_set: &str, histo: &str, kind: &str) -> String {
    [data_set, histo, "data", kind].join("_")
}

/// Degrees of freedom used to normalise a channel's chi-square.
pub fn channel_ndof(num: &Histogram) -> usize {
    num.non_empty_bins().saturating_sub(3).max(1)
}

#[derive(Debug, Clone)]
pub struct ChannelOutput {
    pub name: String,
    pub scenario: ChannelScenario,
    pub num_integral: f64,
    pub denom_integral: f64,
    pub ndof: usize,
    /// Efficiency after the channel rebin.
    pub efficiency: EfficiencyGraph,
    pub chi2_ndf: f64,
}

#[derive(Debug, Clone)]
pub struct ObjectOutput {
    pub name: String,
    pub config: ObjectConfig,
    pub channels: Vec<ChannelOutput>,
    /// Combined histograms after the object rebin.
    pub combined_num: Histogram,
    pub combined_denom: Histogram,
    pub combined_eff: EfficiencyGraph,
    pub least_squares: LeastSquaresFit,
    pub likelihood: LikelihoodFit,
    pub result: ObjectResult,
}

/// All computed outputs of a `combine` run.
#[derive(Debug, Clone)]
pub struct CombineOutput {
    pub objects: Vec<ObjectOutput>,
    pub fake_rates: FakeRateFile,
}

/// Fit options shared by every object.
#[derive(Debug, Clone, Default)]
pub struct FitSettings {
    pub least_squares: LeastSquaresOptions,
    pub likelihood: LikelihoodOptions,
}

/// Combine and fit every object of the configured catalog.
pub fn run_combine(config: &CombineConfig, source: &mut dyn HistogramSource) -> Result<CombineOutput, AppError> {
    let settings = FitSettings::default();
    let mut objects = Vec::with_capacity(config.catalog.len());
    let mut fake_rates = FakeRateFile::new();

    for (name, object_config) in &config.catalog {
        info!("Computing fake rates for object: {name}");
        let output = combine_object(name, object_config, &config.files, &config.data_set, &settings, source)
            .map_err(|e| e.context(format!("object '{name}'")))?;
        fake_rates.insert(name.clone(), output.result.clone());
        objects.push(output);
    }

    Ok(CombineOutput { objects, fake_rates })
}

struct RawChannel {
    name: String,
    scenario: ChannelScenario,
    num: Histogram,
    denom: Histogram,
}

/// Combine and fit a single object.
pub fn combine_object(
    name: &str,
    config: &ObjectConfig,
    files: &InputFiles,
    data_set: &str,
    settings: &FitSettings,
    source: &mut dyn HistogramSource,
) -> Result<ObjectOutput, AppError> {
    let mut raw = Vec::with_capacity(config.scenarios.len());
    let mut combined: Option<(Histogram, Histogram)> = None;

    for (channel, scenario) in &config.scenarios {
        debug!("Getting fake rates for object: {name} type: {channel}");
        let path = files.path(scenario.file);
        let num = source.histogram(path, &histogram_name(data_set, &scenario.histo, "num"))?;
        let denom = source.histogram(path, &histogram_name(data_set, &scenario.histo, "denom"))?;
        info!(
            "{name}/{channel}: numerator {} denominator {}{}",
            num.integral(),
            denom.integral(),
            if scenario.exclude { " (excluded)" } else { "" }
        );

        if !scenario.exclude {
            combined = Some(match combined {
                None => (num.clone(), denom.clone()),
                Some((n, d)) => (n.add(&num)?, d.add(&denom)?),
            });
        }
        raw.push(RawChannel {
            name: channel.clone(),
            scenario: scenario.clone(),
            num,
            denom,
        });
    }

    let Some((combined_num, combined_denom)) = combined else {
        return Err(AppError::new(
            3,
            format!("All channels of '{name}' are excluded; nothing to combine."),
        ));
    };

    info!("Computing combined efficiency");
    let combined_num = combined_num.rebinned(config.rebin);
    let combined_denom = combined_denom.rebinned(config.rebin);
    let combined_eff = EfficiencyGraph::from_histograms(&combined_num, &combined_denom)?;
    if combined_eff.is_empty() {
        return Err(AppError::new(
            3,
            format!("Combined denominator of '{name}' is empty; nothing to fit."),
        ));
    }

    info!("Fitting {name} with least squares");
    let least_squares = fit_least_squares(config.function, &combined_eff, &settings.least_squares)?;
    debug!(
        "{name}: least squares params={:?} chi2={:.3} status={}",
        least_squares.params, least_squares.chi2, least_squares.status
    );

    info!("Fitting {name} with binomial likelihood");
    let data = BinomialData::from_histograms(&combined_num, &combined_denom, OBSERVABLE_RANGE)?;
    let likelihood = fit_likelihood(config.function, &data, &settings.likelihood, &[least_squares.params])?;
    if !likelihood.status.is_converged() {
        warn!("{name}: likelihood fit did not converge (status {})", likelihood.status);
    }

    let mut channels = Vec::with_capacity(raw.len());
    for ch in raw {
        let ndof = channel_ndof(&ch.num);
        let num = ch.num.rebinned(ch.scenario.rebin);
        let denom = ch.denom.rebinned(ch.scenario.rebin);
        let efficiency = EfficiencyGraph::from_histograms(&num, &denom)?;
        let chi2 = efficiency.chi_square(|x| least_squares.eval(x));
        channels.push(ChannelOutput {
            name: ch.name,
            scenario: ch.scenario,
            num_integral: ch.num.integral(),
            denom_integral: ch.denom.integral(),
            ndof,
            efficiency,
            chi2_ndf: chi2 / ndof as f64,
        });
    }

    let result = summarize(config, &channels, &combined_num, &combined_denom, &likelihood);
    Ok(ObjectOutput {
        name: name.to_string(),
        config: config.clone(),
        channels,
        combined_num,
        combined_denom,
        combined_eff,
        least_squares,
        likelihood,
        result,
    })
}

fn summarize(
    config: &ObjectConfig,
    channels: &[ChannelOutput],
    combined_num: &Histogram,
    combined_denom: &Histogram,
    likelihood: &LikelihoodFit,
) -> ObjectResult {
    let types: BTreeMap<String, ChannelSummary> = channels
        .iter()
        .map(|c| {
            (
                c.name.clone(),
                ChannelSummary {
                    num: c.num_integral,
                    denom: c.denom_integral,
                    ndof: c.ndof,
                    chi2_ndf: c.chi2_ndf,
                },
            )
        })
        .collect();

    let num = combined_num.integral();
    let denom = combined_denom.integral();
    let combined_eff = if denom > 0.0 { num / denom } else { 0.0 };

    ObjectResult {
        types,
        combined_num: num,
        combined_denom: denom,
        combined_eff,
        vars: FitVars::from_params(&likelihood.params),
        fit_status: likelihood.status.code(),
        raw_func: config.function.raw_formula().to_string(),
        fitted_func: config.function.fitted_formula(&likelihood.params),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_names_follow_storage_convention() {
        assert_eq!(histogram_name("2011AB", "mu", "num"), "2011AB_mu_data_num");
        assert_eq!(histogram_name("2011AB", "tau_barrel", "denom"), "2011AB_tau_barrel_data_denom");
    }

    #[test]
    fn ndof_is_at_least_one() {
        let empty = Histogram::uniform("n", 0.0, 10.0, vec![0.0; 10]).unwrap();
        assert_eq!(channel_ndof(&empty), 1);
        let full = Histogram::uniform("n", 0.0, 10.0, vec![1.0; 10]).unwrap();
        assert_eq!(channel_ndof(&full), 7);
    }
}
