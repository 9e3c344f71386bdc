//! Fake-rate model evaluation.
//!
//! The fitters rely on three primitive operations:
//! - build a design row of the linear parameters for fixed `(mu, sigma)` (for OLS)
//! - predict `f(x)` given all parameters (for residuals, likelihoods and plots)
//! - render the model as a C++ expression for the generated macro

use serde::{Deserialize, Serialize};

use crate::math::landau;

/// Number of parameters of every supported function.
pub const PARAM_COUNT: usize = 4;

/// Parameter names, in the order used by parameter vectors everywhere.
pub const PARAM_NAMES: [&str; PARAM_COUNT] = ["scale", "mu", "sigma", "offset"];

/// Name of the independent variable in the raw formula.
pub const RAW_VARIABLE: &str = "jetPt";

/// Placeholder for the independent variable in the fitted formula.
pub const FITTED_VARIABLE: &str = "VAR";

/// Functional forms available to object configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitFunction {
    /// `scale·Landau(x; mu, sigma) + offset`
    #[default]
    LandauPlusOffset,
}

impl FitFunction {
    pub fn display_name(self) -> &'static str {
        match self {
            FitFunction::LandauPlusOffset => "Landau + offset",
        }
    }

    /// Formula in ROOT `TFormula` syntax with symbolic parameters.
    pub fn raw_formula(self) -> &'static str {
        match self {
            FitFunction::LandauPlusOffset => "scale*TMath::Landau(jetPt,mu,sigma,0)+offset",
        }
    }

    /// Evaluate the function at `x`.
    pub fn predict(self, x: f64, params: &[f64; PARAM_COUNT]) -> f64 {
        match self {
            FitFunction::LandauPlusOffset => {
                let [scale, mu, sigma, offset] = *params;
                scale * landau(x, mu, sigma) + offset
            }
        }
    }

    /// Design row `[∂f/∂scale, ∂f/∂offset]` for fixed nonlinear parameters.
    pub fn linear_row(self, x: f64, mu: f64, sigma: f64) -> Vec<f64> {
        match self {
            FitFunction::LandauPlusOffset => vec![landau(x, mu, sigma), 1.0],
        }
    }

    /// Substitute fitted values into the raw formula.
    ///
    /// The variable becomes `VAR` and every parameter is printed as `%0.4e`.
    pub fn fitted_formula(self, params: &[f64; PARAM_COUNT]) -> String {
        let mut out = self.raw_formula().replace(RAW_VARIABLE, FITTED_VARIABLE);
        for (name, value) in PARAM_NAMES.iter().zip(params) {
            out = out.replace(name, &format_sci(*value));
        }
        out
    }
}

/// C-style `%0.4e` formatting: four mantissa decimals and a signed exponent
/// of at least two digits (e.g. `3.5000e+00`, `-1.2300e-05`).
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let rust = format!("{value:.4e}");
    let Some((mantissa, exponent)) = rust.split_once('e') else {
        return rust;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}
