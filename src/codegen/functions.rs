//! The set of generated fake-rate functions.
//!
//! Built from `fake_rates.json`:
//!
//! - eta-independent object `X`: `fakerate_X` (fitted curve) and
//!   `fakerate_X_flat` (combined efficiency)
//! - eta-dependent group `X` (`X_barrel` + `X_endcap`): `fakerate_X_eta` and
//!   `fakerate_X_eta_flat`, split at `|eta| = 1.44`
//! - for every function `F` above, `weight_F = F / (1 - F)`
//!
//! The set can be rendered to C++ (`render`) or evaluated directly.

use std::collections::BTreeSet;

use log::info;

use crate::domain::{ETA_REGIONS, FakeRateFile, ObjectResult};
use crate::error::AppError;
use crate::models::{FITTED_VARIABLE, FitFunction, format_sci};

/// `|eta|` boundary between barrel and endcap.
pub const ETA_BOUNDARY: f64 = 1.44;

/// Returned when no eta branch applies.
pub const OUT_OF_BOUNDS: f64 = -999.0;

/// A fake-rate expression in `pt`.
#[derive(Debug, Clone, PartialEq)]
pub enum RateExpr {
    /// The fitted curve; `text` is the C++ expression in `pt`.
    Curve {
        function: FitFunction,
        params: [f64; 4],
        text: String,
    },
    /// A constant printed with six decimals.
    Flat(f64),
}

impl RateExpr {
    fn curve(result: &ObjectResult) -> Self {
        // Evaluate with exactly the digits that end up in the macro.
        let params = result
            .vars
            .to_params()
            .map(|v| format_sci(v).parse().unwrap_or(v));
        RateExpr::Curve {
            function: FitFunction::LandauPlusOffset,
            params,
            text: result.fitted_func.replace(FITTED_VARIABLE, "pt"),
        }
    }

    fn flat(result: &ObjectResult) -> Self {
        let rounded = format!("{:.6}", result.combined_eff);
        RateExpr::Flat(rounded.parse().unwrap_or(result.combined_eff))
    }

    pub fn uses_pt(&self) -> bool {
        matches!(self, RateExpr::Curve { .. })
    }

    /// C++ source of the expression.
    pub fn source(&self) -> String {
        match self {
            RateExpr::Curve { text, .. } => text.clone(),
            RateExpr::Flat(v) => format!("{v:.6}"),
        }
    }

    pub fn eval(&self, pt: f64) -> f64 {
        match self {
            RateExpr::Curve { function, params, .. } => function.predict(pt, params),
            RateExpr::Flat(v) => *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Rate(RateExpr),
    EtaSplit { barrel: RateExpr, endcap: RateExpr },
    /// `rate / (1 - rate)` of the named function.
    Weight { rate: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: FunctionBody,
}

impl FunctionDef {
    pub fn uses_pt(&self) -> bool {
        match &self.body {
            FunctionBody::Rate(e) => e.uses_pt(),
            FunctionBody::EtaSplit { barrel, endcap } => barrel.uses_pt() || endcap.uses_pt(),
            FunctionBody::Weight { .. } => true,
        }
    }

    pub fn uses_eta(&self) -> bool {
        !matches!(self.body, FunctionBody::Rate(_))
    }
}

/// Ordered function definitions, rate functions first and weights last.
#[derive(Debug, Clone, Default)]
pub struct FunctionSet {
    pub functions: Vec<FunctionDef>,
}

impl FunctionSet {
    pub fn from_fake_rates(fake_rates: &FakeRateFile) -> Result<Self, AppError> {
        let mut independent = BTreeSet::new();
        let mut grouped = BTreeSet::new();
        for name in fake_rates.keys() {
            if ETA_REGIONS.iter().any(|region| name.contains(region)) {
                let group = name.split('_').next().unwrap_or(name);
                info!("Found eta dependent rate {group}");
                grouped.insert(group.to_string());
            } else {
                info!("Found eta independent rate {name}");
                independent.insert(name.clone());
            }
        }

        let mut rates = Vec::new();
        for name in &independent {
            let result = &fake_rates[name];
            info!("Defining independent fake rate: {name} = {}", result.fitted_func);
            rates.push(FunctionDef {
                name: format!("fakerate_{name}"),
                body: FunctionBody::Rate(RateExpr::curve(result)),
            });
            rates.push(FunctionDef {
                name: format!("fakerate_{name}_flat"),
                body: FunctionBody::Rate(RateExpr::flat(result)),
            });
        }

        for group in &grouped {
            let barrel = region_result(fake_rates, group, "barrel")?;
            let endcap = region_result(fake_rates, group, "endcap")?;
            info!("Defining barrel fake rate: {group} = {}", barrel.fitted_func);
            info!("Defining endcap fake rate: {group} = {}", endcap.fitted_func);
            rates.push(FunctionDef {
                name: format!("fakerate_{group}_eta"),
                body: FunctionBody::EtaSplit {
                    barrel: RateExpr::curve(barrel),
                    endcap: RateExpr::curve(endcap),
                },
            });
            rates.push(FunctionDef {
                name: format!("fakerate_{group}_eta_flat"),
                body: FunctionBody::EtaSplit {
                    barrel: RateExpr::flat(barrel),
                    endcap: RateExpr::flat(endcap),
                },
            });
        }

        let weights: Vec<FunctionDef> = rates
            .iter()
            .map(|f| FunctionDef {
                name: f.name.replacen("fakerate_", "weight_", 1),
                body: FunctionBody::Weight { rate: f.name.clone() },
            })
            .collect();

        let mut functions = rates;
        functions.extend(weights);
        Ok(Self { functions })
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Evaluate function `name` the way the generated C++ would.
    pub fn eval(&self, name: &str, pt: f64, eta: f64) -> Option<f64> {
        match &self.get(name)?.body {
            FunctionBody::Rate(expr) => Some(expr.eval(pt)),
            FunctionBody::EtaSplit { barrel, endcap } => {
                let abs_eta = eta.abs();
                if abs_eta < ETA_BOUNDARY {
                    Some(barrel.eval(pt))
                } else if abs_eta >= ETA_BOUNDARY {
                    Some(endcap.eval(pt))
                } else {
                    Some(OUT_OF_BOUNDS)
                }
            }
            FunctionBody::Weight { rate } => {
                let fr = self.eval(rate, pt, eta)?;
                Some(fr / (1.0 - fr))
            }
        }
    }
}

fn region_result<'a>(
    fake_rates: &'a FakeRateFile,
    group: &str,
    region: &str,
) -> Result<&'a ObjectResult, AppError> {
    fake_rates.get(&format!("{group}_{region}")).ok_or_else(|| {
        AppError::new(
            2,
            format!("Eta-dependent fake rate '{group}' is missing its {region} entry '{group}_{region}'."),
        )
    })
}
