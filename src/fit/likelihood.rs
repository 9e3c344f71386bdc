//! Binned binomial likelihood fit of pass/fail histograms.
//!
//! ```text
//! NLL = -Σ pass_i·ln ε(x_i) + fail_i·ln(1 - ε(x_i))
//! ```
//!
//! evaluated at the centres of the bins inside the observable range, with `ε`
//! clamped to `[1e-12, 1 - 1e-12]`. The fit is conditional on the bin
//! totals, so only the efficiency shape matters.

use log::debug;

use crate::error::AppError;
use crate::fit::{FitStatus, Objective, OptimizerConfig, minimize};
use crate::hist::Histogram;
use crate::models::{FitFunction, PARAM_COUNT};

const EPS_MIN: f64 = 1e-12;

/// Observable range of the jet pT variable, in GeV.
pub const OBSERVABLE_RANGE: (f64, f64) = (0.0, 100.0);

/// Pass/fail counts at bin centres.
#[derive(Debug, Clone, Default)]
pub struct BinomialData {
    pub x: Vec<f64>,
    pub pass: Vec<f64>,
    pub fail: Vec<f64>,
}

impl BinomialData {
    /// Build from a numerator (`pass`) and denominator (`total`) histogram.
    ///
    /// Bins whose centre lies outside `range` are dropped; negative fail
    /// counts (numerator above denominator) are treated as zero.
    pub fn from_histograms(pass: &Histogram, total: &Histogram, range: (f64, f64)) -> Result<Self, AppError> {
        let fail = total.sub(pass)?;
        let mut data = BinomialData::default();
        for i in 0..pass.n_bins() {
            let x = pass.bin_center(i);
            if x < range.0 || x > range.1 {
                continue;
            }
            data.x.push(x);
            data.pass.push(pass.contents[i].max(0.0));
            data.fail.push(fail.contents[i].max(0.0));
        }
        Ok(data)
    }

    pub fn total(&self) -> f64 {
        self.pass.iter().sum::<f64>() + self.fail.iter().sum::<f64>()
    }
}

/// Negative log-likelihood of `data` under `function` with `params`.
pub fn binomial_nll(function: FitFunction, data: &BinomialData, params: &[f64; PARAM_COUNT]) -> f64 {
    let mut nll = 0.0;
    for i in 0..data.x.len() {
        let eps = function.predict(data.x[i], params).clamp(EPS_MIN, 1.0 - EPS_MIN);
        if data.pass[i] > 0.0 {
            nll -= data.pass[i] * eps.ln();
        }
        if data.fail[i] > 0.0 {
            nll -= data.fail[i] * (1.0 - eps).ln();
        }
    }
    nll
}

#[derive(Debug, Clone)]
pub struct LikelihoodOptions {
    /// `[scale, mu, sigma, offset]`
    pub start: [f64; PARAM_COUNT],
    pub bounds: [(f64, f64); PARAM_COUNT],
    pub optimizer: OptimizerConfig,
}

impl Default for LikelihoodOptions {
    fn default() -> Self {
        Self {
            start: [0.5, 10.0, 1.0, 0.01],
            bounds: [(0.0, 10.0), (0.0, 100.0), (0.5, 10.0), (0.0, 1.0)],
            optimizer: OptimizerConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LikelihoodFit {
    pub function: FitFunction,
    pub params: [f64; PARAM_COUNT],
    pub nll: f64,
    pub status: FitStatus,
}

impl LikelihoodFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.function.predict(x, &self.params)
    }

    /// The fitted curve with `scale` multiplied by `factor`.
    pub fn eval_scaled(&self, x: f64, factor: f64) -> f64 {
        let mut p = self.params;
        p[0] *= factor;
        self.function.predict(x, &p)
    }
}

struct Nll<'a> {
    function: FitFunction,
    data: &'a BinomialData,
}

impl Objective for Nll<'_> {
    fn eval(&self, params: &[f64]) -> f64 {
        let mut p = [0.0; PARAM_COUNT];
        for (o, v) in p.iter_mut().zip(params) {
            *o = *v;
        }
        binomial_nll(self.function, self.data, &p)
    }
}

/// Fit `data`, starting from the nominal start values and from each entry
/// of `extra_starts` (clamped into the bounds). The lowest NLL wins; on a
/// tie the earlier start is kept.
pub fn fit_likelihood(
    function: FitFunction,
    data: &BinomialData,
    opts: &LikelihoodOptions,
    extra_starts: &[[f64; PARAM_COUNT]],
) -> Result<LikelihoodFit, AppError> {
    if data.x.is_empty() || data.total() <= 0.0 {
        return Err(AppError::new(3, "No entries inside the observable range to fit."));
    }

    let objective = Nll { function, data };
    let mut best: Option<LikelihoodFit> = None;
    for start in std::iter::once(&opts.start).chain(extra_starts) {
        let min = minimize(&objective, start, &opts.bounds, &opts.optimizer)?;
        debug!(
            "Likelihood fit from {:?}: nll={:.6} status={}",
            start, min.fval, min.status
        );
        let mut params = [0.0; PARAM_COUNT];
        for (o, v) in params.iter_mut().zip(&min.params) {
            *o = *v;
        }
        let candidate = LikelihoodFit {
            function,
            params,
            nll: min.fval,
            status: min.status,
        };
        if best.as_ref().is_none_or(|b| candidate.nll < b.nll) {
            best = Some(candidate);
        }
    }

    best.ok_or_else(|| AppError::new(4, "Likelihood fit produced no result."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Binomial, Distribution};

    const TRUTH: [f64; 4] = [2.0, 15.0, 3.0, 0.02];

    fn centers() -> Vec<f64> {
        (0..20).map(|i| 2.5 + 5.0 * i as f64).collect()
    }

    fn data_from(pass: Vec<f64>, total: f64) -> BinomialData {
        let n = pass.len();
        let num = Histogram::uniform("num", 0.0, 100.0, pass).unwrap();
        let denom = Histogram::uniform("denom", 0.0, 100.0, vec![total; n]).unwrap();
        BinomialData::from_histograms(&num, &denom, OBSERVABLE_RANGE).unwrap()
    }

    #[test]
    fn nll_is_minimal_at_truth_for_expected_counts() {
        let f = FitFunction::LandauPlusOffset;
        let pass = centers().iter().map(|&x| 1000.0 * f.predict(x, &TRUTH)).collect();
        let data = data_from(pass, 1000.0);
        let at_truth = binomial_nll(f, &data, &TRUTH);
        let mut shifted = TRUTH;
        shifted[1] += 1.0;
        assert!(binomial_nll(f, &data, &shifted) > at_truth);
    }

    #[test]
    fn recovers_parameters_from_noiseless_counts() {
        let f = FitFunction::LandauPlusOffset;
        let pass = centers().iter().map(|&x| 1000.0 * f.predict(x, &TRUTH)).collect();
        let data = data_from(pass, 1000.0);
        let near = [2.2, 14.0, 3.3, 0.03];
        let fit = fit_likelihood(f, &data, &LikelihoodOptions::default(), &[near]).unwrap();
        for (got, want) in fit.params.iter().zip(TRUTH) {
            assert!((got - want).abs() <= 0.03 * want, "got {:?}", fit.params);
        }
    }

    #[test]
    fn sampled_fit_beats_truth() {
        let f = FitFunction::LandauPlusOffset;
        let mut rng = StdRng::seed_from_u64(7);
        let total = 2000u64;
        let pass: Vec<f64> = centers()
            .iter()
            .map(|&x| {
                let p = f.predict(x, &TRUTH);
                Binomial::new(total, p).unwrap().sample(&mut rng) as f64
            })
            .collect();
        let data = data_from(pass, total as f64);
        let fit = fit_likelihood(f, &data, &LikelihoodOptions::default(), &[TRUTH]).unwrap();

        // The maximum-likelihood point can only improve on the truth.
        assert!(fit.nll <= binomial_nll(f, &data, &TRUTH) + 1e-9);
        assert!((fit.params[1] - TRUTH[1]).abs() < 0.2 * TRUTH[1], "got {:?}", fit.params);
    }

    #[test]
    fn drops_bins_outside_observable_range() {
        let num = Histogram::uniform("num", 0.0, 200.0, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let denom = Histogram::uniform("denom", 0.0, 200.0, vec![2.0, 4.0, 6.0, 8.0]).unwrap();
        let data = BinomialData::from_histograms(&num, &denom, OBSERVABLE_RANGE).unwrap();
        assert_eq!(data.x, vec![25.0, 75.0]);
        assert_eq!(data.fail, vec![1.0, 2.0]);
    }

    #[test]
    fn empty_data_is_insufficient() {
        let err = fit_likelihood(
            FitFunction::LandauPlusOffset,
            &BinomialData::default(),
            &LikelihoodOptions::default(),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn scaled_curve_multiplies_scale_only() {
        let fit = LikelihoodFit {
            function: FitFunction::LandauPlusOffset,
            params: TRUTH,
            nll: 0.0,
            status: FitStatus::Converged,
        };
        let base = fit.eval(15.0) - TRUTH[3];
        assert!((fit.eval_scaled(15.0, 1.1) - TRUTH[3] - 1.1 * base).abs() < 1e-12);
    }
}
