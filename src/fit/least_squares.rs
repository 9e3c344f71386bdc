//! Least-squares fit of an efficiency graph.
//!
//! Two stages:
//!
//! 1. For every `(mu, sigma)` in the seed grid (evaluated in parallel), solve
//!    the linear parameters `(scale, offset)` by weighted least squares with
//!    symmetric errors `(eyl + eyh) / 2`, reject candidates outside the scale
//!    limits, and score the rest with the asymmetric chi-square.
//! 2. Refine all four parameters with bounded L-BFGS on the asymmetric
//!    chi-square, starting from the better of the best seed and the nominal
//!    start values.

use rayon::prelude::*;

use crate::error::AppError;
use crate::fit::{FitStatus, Objective, OptimizerConfig, SeedGrid, minimize};
use crate::hist::EfficiencyGraph;
use crate::math::solve_weighted;
use crate::models::{FitFunction, PARAM_COUNT};

#[derive(Debug, Clone)]
pub struct LeastSquaresOptions {
    /// `[scale, mu, sigma, offset]`
    pub start: [f64; PARAM_COUNT],
    pub bounds: [(f64, f64); PARAM_COUNT],
    pub grid: SeedGrid,
    pub optimizer: OptimizerConfig,
}

impl Default for LeastSquaresOptions {
    fn default() -> Self {
        Self {
            start: [3.5, 17.0, 1.9, 0.01],
            // Only `scale` carries a physical limit; the others are kept
            // finite for the optimizer.
            bounds: [(0.0, 10.0), (-1000.0, 1000.0), (1e-3, 1000.0), (-1.0, 1.0)],
            grid: SeedGrid::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    pub function: FitFunction,
    pub params: [f64; PARAM_COUNT],
    pub chi2: f64,
    /// Graph points with a usable error.
    pub n_points: usize,
    pub status: FitStatus,
}

impl LeastSquaresFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.function.predict(x, &self.params)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    params: [f64; PARAM_COUNT],
    chi2: f64,
}

struct Chi2<'a> {
    function: FitFunction,
    graph: &'a EfficiencyGraph,
}

impl Objective for Chi2<'_> {
    fn eval(&self, params: &[f64]) -> f64 {
        let p = to_array(params);
        self.graph.chi_square(|x| self.function.predict(x, &p))
    }
}

fn to_array(params: &[f64]) -> [f64; PARAM_COUNT] {
    let mut out = [0.0; PARAM_COUNT];
    for (o, p) in out.iter_mut().zip(params) {
        *o = *p;
    }
    out
}

pub fn fit_least_squares(
    function: FitFunction,
    graph: &EfficiencyGraph,
    opts: &LeastSquaresOptions,
) -> Result<LeastSquaresFit, AppError> {
    let usable: Vec<usize> = (0..graph.points.len())
        .filter(|&i| graph.points[i].eyl + graph.points[i].eyh > 0.0)
        .collect();
    if usable.is_empty() {
        return Err(AppError::new(3, "No efficiency points with non-zero errors to fit."));
    }

    let seeds = opts.grid.points()?;
    let objective = Chi2 { function, graph };

    let scale_limits = opts.bounds[0];
    let best_seed = match scan_seeds(function, graph, &usable, &seeds, Some(scale_limits)) {
        Some(c) => Some(c),
        // The scale limit is a guardrail, not a reason to fail the fit.
        None => scan_seeds(function, graph, &usable, &seeds, None),
    };

    let nominal_chi2 = objective.eval(&opts.start);
    let start = match best_seed {
        Some(c) if c.chi2 < nominal_chi2 || !nominal_chi2.is_finite() => c.params,
        _ => opts.start,
    };

    let min = minimize(&objective, &start, &opts.bounds, &opts.optimizer)?;
    let params = to_array(&min.params);
    if params.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "Least-squares fit produced non-finite parameters."));
    }

    Ok(LeastSquaresFit {
        function,
        params,
        chi2: min.fval,
        n_points: usable.len(),
        status: min.status,
    })
}

fn scan_seeds(
    function: FitFunction,
    graph: &EfficiencyGraph,
    usable: &[usize],
    seeds: &[(f64, f64)],
    scale_limits: Option<(f64, f64)>,
) -> Option<Candidate> {
    let ys: Vec<f64> = usable.iter().map(|&i| graph.points[i].y).collect();
    let ws: Vec<f64> = usable
        .iter()
        .map(|&i| {
            let p = &graph.points[i];
            let err = 0.5 * (p.eyl + p.eyh);
            1.0 / (err * err)
        })
        .collect();

    let candidates: Vec<Candidate> = seeds
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &(mu, sigma))| {
            let rows: Vec<Vec<f64>> = usable
                .iter()
                .map(|&i| function.linear_row(graph.points[i].x, mu, sigma))
                .collect();
            let beta = solve_weighted(&rows, &ys, &ws)?;
            let (scale, offset) = (beta[0], beta[1]);
            if let Some((lo, hi)) = scale_limits {
                if scale < lo || scale > hi {
                    return None;
                }
            }
            let params = [scale, mu, sigma, offset];
            let chi2 = graph.chi_square(|x| function.predict(x, &params));
            chi2.is_finite().then_some(Candidate { idx, params, chi2 })
        })
        .collect();

    // Deterministic selection: minimum chi2, ties broken by grid index.
    candidates
        .into_iter()
        .min_by(|a, b| a.chi2.total_cmp(&b.chi2).then(a.idx.cmp(&b.idx)))
}
