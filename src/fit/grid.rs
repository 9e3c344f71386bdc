//! Seed grid generation.
//!
//! The least-squares fit starts from a deterministic grid over the nonlinear
//! parameters `(mu, sigma)`. For each grid point the linear parameters are
//! solved exactly, so the grid only has to cover two dimensions.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::new(
            2,
            format!("Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::new(
            2,
            format!("Invalid linear range: min={min}, max={max}."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Grid steps must be >= 2."));
    }
    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// Extent and resolution of the `(mu, sigma)` seed grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedGrid {
    pub mu_min: f64,
    pub mu_max: f64,
    pub mu_steps: usize,
    pub sigma_min: f64,
    pub sigma_max: f64,
    pub sigma_steps: usize,
}

impl Default for SeedGrid {
    fn default() -> Self {
        Self {
            mu_min: 0.0,
            mu_max: 100.0,
            mu_steps: 41,
            sigma_min: 0.5,
            sigma_max: 20.0,
            sigma_steps: 25,
        }
    }
}

impl SeedGrid {
    /// All `(mu, sigma)` pairs, mu-major.
    pub fn points(&self) -> Result<Vec<(f64, f64)>, AppError> {
        let mus = lin_space(self.mu_min, self.mu_max, self.mu_steps)?;
        let sigmas = log_space(self.sigma_min, self.sigma_max, self.sigma_steps)?;
        Ok(mus
            .iter()
            .flat_map(|&mu| sigmas.iter().map(move |&sigma| (mu, sigma)))
            .collect())
    }
}
