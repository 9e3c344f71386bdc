//! Bounded minimisation with argmin's L-BFGS.
//!
//! Bounds are enforced by clamping: the cost is always evaluated at the
//! clamped parameters and gradient components pushing out of the box at an
//! active bound are zeroed.

use std::fmt;

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use log::debug;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub max_iter: u64,
    /// Gradient-norm tolerance.
    pub tol: f64,
    /// L-BFGS history length.
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tol: 1e-6,
            m: 10,
        }
    }
}

/// Outcome of a minimisation, recorded as an integer in `fake_rates.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Converged,
    /// Stopped early without meeting the tolerance (e.g. line search failure).
    Failed,
    MaxIterations,
}

impl FitStatus {
    pub fn code(self) -> i32 {
        match self {
            FitStatus::Converged => 0,
            FitStatus::Failed => 3,
            FitStatus::MaxIterations => 4,
        }
    }

    pub fn is_converged(self) -> bool {
        self == FitStatus::Converged
    }
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FitStatus::Converged => "converged",
            FitStatus::Failed => "failed",
            FitStatus::MaxIterations => "max iterations",
        };
        write!(f, "{s} ({})", self.code())
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub params: Vec<f64>,
    pub fval: f64,
    pub n_iter: u64,
    pub status: FitStatus,
}

/// Something to minimise.
pub trait Objective {
    fn eval(&self, params: &[f64]) -> f64;

    /// Central differences with a step of `1e-8·max(|x_i|, 1)`.
    fn gradient(&self, params: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; params.len()];
        let mut work = params.to_vec();
        for i in 0..params.len() {
            let eps = 1e-8 * params[i].abs().max(1.0);
            work[i] = params[i] + eps;
            let f_plus = self.eval(&work);
            work[i] = params[i] - eps;
            let f_minus = self.eval(&work);
            work[i] = params[i];
            grad[i] = (f_plus - f_minus) / (2.0 * eps);
        }
        grad
    }
}

pub fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params
        .iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
        .collect()
}

struct Problem<'a> {
    objective: &'a dyn Objective,
    bounds: &'a [(f64, f64)],
}

impl CostFunction for Problem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let value = self.objective.eval(&clamp_params(params, self.bounds));
        if value.is_finite() {
            Ok(value)
        } else {
            Err(argmin::core::Error::msg("objective is not finite"))
        }
    }
}

impl Gradient for Problem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        let clamped = clamp_params(params, self.bounds);
        let mut g = self.objective.gradient(&clamped);

        const EPS: f64 = 1e-12;
        for (i, (&x, &(lo, hi))) in clamped.iter().zip(self.bounds).enumerate() {
            if (x <= lo + EPS && g[i] > 0.0) || (x >= hi - EPS && g[i] < 0.0) {
                g[i] = 0.0;
            }
        }
        Ok(g)
    }
}

/// Minimise `objective` inside the box `bounds`, starting from `init`.
///
/// Solver failures are not errors: they come back as `FitStatus::Failed` with
/// the (clamped) starting point.
pub fn minimize(
    objective: &dyn Objective,
    init: &[f64],
    bounds: &[(f64, f64)],
    config: &OptimizerConfig,
) -> Result<Minimum, AppError> {
    if init.len() != bounds.len() {
        return Err(AppError::new(
            4,
            format!(
                "Parameter and bounds length mismatch: {} != {}.",
                init.len(),
                bounds.len()
            ),
        ));
    }
    if bounds.iter().any(|&(lo, hi)| !(lo <= hi)) {
        return Err(AppError::new(4, "Invalid parameter bounds (lower > upper)."));
    }

    let start = clamp_params(init, bounds);
    let start_cost = objective.eval(&start);
    let fallback = Minimum {
        params: start.clone(),
        fval: start_cost,
        n_iter: 0,
        status: FitStatus::Failed,
    };

    let tol_cost = (0.1 * config.tol).max(1e-12);
    let solver = LBFGS::new(MoreThuenteLineSearch::new(), config.m)
        .with_tolerance_grad(config.tol)
        .and_then(|s| s.with_tolerance_cost(tol_cost))
        .map_err(|e| AppError::new(4, format!("Invalid optimizer configuration: {e}")))?;

    let problem = Problem { objective, bounds };
    let res = match Executor::new(problem, solver)
        .configure(|state| state.param(start).max_iters(config.max_iter))
        .run()
    {
        Ok(res) => res,
        Err(e) => {
            debug!("Optimizer stopped: {e}");
            return Ok(fallback);
        }
    };

    let state = res.state();
    let Some(best) = state.get_best_param() else {
        return Ok(fallback);
    };
    let params = clamp_params(best, bounds);
    let fval = state.get_best_cost();

    let status = match state.get_termination_status() {
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached,
        ) => FitStatus::Converged,
        TerminationStatus::Terminated(TerminationReason::MaxItersReached) => FitStatus::MaxIterations,
        _ => FitStatus::Failed,
    };

    if !fval.is_finite() || fval > start_cost {
        return Ok(fallback);
    }

    Ok(Minimum {
        params,
        fval,
        n_iter: state.get_iter(),
        status,
    })
}
