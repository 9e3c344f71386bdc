//! Efficiency graphs with asymmetric binomial errors.
//!
//! Each point is `k/n` for a pass/total bin pair with a Clopper–Pearson
//! interval at 68.27% confidence (one standard deviation):
//!
//! - lower = `Beta(k, n-k+1).quantile(α/2)`, 0 when `k = 0`
//! - upper = `Beta(k+1, n-k).quantile(1-α/2)`, 1 when `k = n`
//!
//! Bins with a non-positive total are skipped.

use statrs::function::beta::beta_reg;

use crate::error::AppError;
use crate::hist::Histogram;

/// One-sigma coverage.
pub const CONFIDENCE_LEVEL: f64 = 0.682689492137;

#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyPoint {
    pub x: f64,
    /// Half bin width on each side.
    pub ex: f64,
    pub y: f64,
    pub eyl: f64,
    pub eyh: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EfficiencyGraph {
    pub points: Vec<EfficiencyPoint>,
}

impl EfficiencyGraph {
    /// Divide `pass` by `total` bin by bin.
    pub fn from_histograms(pass: &Histogram, total: &Histogram) -> Result<Self, AppError> {
        if pass.edges != total.edges {
            return Err(AppError::new(
                4,
                format!(
                    "Cannot divide '{}' by '{}': binning differs.",
                    pass.name, total.name
                ),
            ));
        }

        let mut points = Vec::with_capacity(pass.n_bins());
        for i in 0..pass.n_bins() {
            let n = total.contents[i];
            if n <= 0.0 {
                continue;
            }
            let k = pass.contents[i].clamp(0.0, n);
            let (lo, hi) = clopper_pearson(k, n, CONFIDENCE_LEVEL);
            let y = k / n;
            points.push(EfficiencyPoint {
                x: pass.bin_center(i),
                ex: pass.bin_half_width(i),
                y,
                eyl: (y - lo).max(0.0),
                eyh: (hi - y).max(0.0),
            });
        }
        Ok(Self { points })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Chi-square of the graph against `f`.
    ///
    /// Each point uses the effective variance `ey² + (ex·f'(x))²`, where `ey`
    /// is the upper error when the function lies above the point and the
    /// lower error otherwise. Points with zero variance are skipped.
    pub fn chi_square(&self, f: impl Fn(f64) -> f64) -> f64 {
        self.points
            .iter()
            .filter_map(|p| {
                let fx = f(p.x);
                let ey = if fx > p.y { p.eyh } else { p.eyl };
                let ex = if p.ex > 0.0 { p.ex * derivative(&f, p.x) } else { 0.0 };
                let variance = ey * ey + ex * ex;
                (variance > 0.0 && variance.is_finite()).then(|| {
                    let r = p.y - fx;
                    r * r / variance
                })
            })
            .sum()
    }

    /// Finite x-range spanned by the points (including bin half-widths).
    pub fn x_range(&self) -> Option<(f64, f64)> {
        let lo = self.points.iter().map(|p| p.x - p.ex).fold(f64::INFINITY, f64::min);
        let hi = self.points.iter().map(|p| p.x + p.ex).fold(f64::NEG_INFINITY, f64::max);
        (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
    }
}

/// Central difference with a step of `1e-5·max(|x|, 1)`.
fn derivative(f: &impl Fn(f64) -> f64, x: f64) -> f64 {
    let h = 1e-5 * x.abs().max(1.0);
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Clopper–Pearson interval for `k` successes out of `n` trials.
pub fn clopper_pearson(k: f64, n: f64, level: f64) -> (f64, f64) {
    let half_alpha = 0.5 * (1.0 - level);
    let lower = if k <= 0.0 {
        0.0
    } else if k >= n {
        half_alpha.powf(1.0 / n)
    } else {
        beta_quantile(k, n - k + 1.0, half_alpha).unwrap_or(0.0)
    };
    let upper = if k >= n {
        1.0
    } else if k <= 0.0 {
        1.0 - half_alpha.powf(1.0 / n)
    } else {
        beta_quantile(k + 1.0, n - k, 1.0 - half_alpha).unwrap_or(1.0)
    };
    (lower, upper)
}

const QUANTILE_TOLERANCE: f64 = 1e-12;

/// Quantile of `Beta(a, b)` by bisection on the regularized incomplete beta.
fn beta_quantile(a: f64, b: f64, p: f64) -> Option<f64> {
    if !(a > 0.0 && b > 0.0 && a.is_finite() && b.is_finite() && (0.0..=1.0).contains(&p)) {
        return None;
    }
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    while hi - lo > QUANTILE_TOLERANCE {
        let mid = 0.5 * (lo + hi);
        if beta_reg(a, b, mid) < p {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hist(contents: &[f64]) -> Histogram {
        Histogram::uniform("h", 0.0, 10.0 * contents.len() as f64, contents.to_vec()).unwrap()
    }

    #[test]
    fn interval_contains_estimate() {
        for &(k, n) in &[(1.0, 10.0), (5.0, 10.0), (30.0, 200.0), (99.0, 100.0)] {
            let (lo, hi) = clopper_pearson(k, n, CONFIDENCE_LEVEL);
            assert!(lo < k / n && k / n < hi, "k={k} n={n} lo={lo} hi={hi}");
        }
    }

    #[test]
    fn interval_clamps_at_edges() {
        let (lo, hi) = clopper_pearson(0.0, 10.0, CONFIDENCE_LEVEL);
        assert_eq!(lo, 0.0);
        // Upper limit for k=0 is 1 - (α/2)^(1/n).
        let alpha: f64 = 1.0 - CONFIDENCE_LEVEL;
        assert_relative_eq!(hi, 1.0 - (alpha / 2.0).powf(0.1), epsilon = 1e-12);

        let (lo, hi) = clopper_pearson(10.0, 10.0, CONFIDENCE_LEVEL);
        assert_eq!(hi, 1.0);
        assert_relative_eq!(lo, (alpha / 2.0).powf(0.1), epsilon = 1e-12);
    }

    #[test]
    fn interval_is_accurate_for_large_samples() {
        let alpha: f64 = 1.0 - CONFIDENCE_LEVEL;
        let (_, hi) = clopper_pearson(0.0, 100.0, CONFIDENCE_LEVEL);
        assert_relative_eq!(hi, 1.0 - (alpha / 2.0).powf(0.01), epsilon = 1e-12);
        assert_relative_eq!(hi, 0.018242, epsilon = 1e-5);
    }

    #[test]
    fn interior_quantile_matches_closed_form() {
        // Beta(1, 2) has CDF 1 - (1 - x)^2, the lower limit for k=1 of n=2.
        let alpha: f64 = 1.0 - CONFIDENCE_LEVEL;
        let (lo, _) = clopper_pearson(1.0, 2.0, CONFIDENCE_LEVEL);
        assert_relative_eq!(lo, 1.0 - (1.0 - alpha / 2.0).sqrt(), epsilon = 1e-10);
        // Beta(2, 1) has CDF x^2, the upper limit for k=1 of n=2.
        let (_, hi) = clopper_pearson(1.0, 2.0, CONFIDENCE_LEVEL);
        assert_relative_eq!(hi, (1.0 - alpha / 2.0).sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn graph_skips_empty_denominator_bins() {
        let g = EfficiencyGraph::from_histograms(&hist(&[1.0, 0.0, 2.0]), &hist(&[4.0, 0.0, 8.0])).unwrap();
        assert_eq!(g.points.len(), 2);
        assert_relative_eq!(g.points[0].y, 0.25);
        assert_relative_eq!(g.points[1].x, 25.0);
    }

    #[test]
    fn chi_square_is_zero_on_exact_function() {
        let g = EfficiencyGraph::from_histograms(&hist(&[1.0, 2.0]), &hist(&[4.0, 8.0])).unwrap();
        assert_relative_eq!(g.chi_square(|_| 0.25), 0.0, epsilon = 1e-12);
        assert!(g.chi_square(|_| 0.5) > 0.0);
    }

    #[test]
    fn wide_bins_use_slope_in_variance() {
        use crate::models::FitFunction;

        // Ten 10 GeV bins whose numerators are the bin-averaged curve.
        let f = FitFunction::LandauPlusOffset;
        let truth = [3.5, 17.0, 1.9, 0.01];
        let total = 2000.0;
        let steps = 1000;
        let pass: Vec<f64> = (0..10)
            .map(|i| {
                let lo = 10.0 * i as f64;
                let avg = (0..steps)
                    .map(|j| f.predict(lo + 10.0 * (j as f64 + 0.5) / steps as f64, &truth))
                    .sum::<f64>()
                    / steps as f64;
                total * avg
            })
            .collect();
        let num = Histogram::uniform("num", 0.0, 100.0, pass).unwrap();
        let denom = Histogram::uniform("denom", 0.0, 100.0, vec![total; 10]).unwrap();
        let g = EfficiencyGraph::from_histograms(&num, &denom).unwrap();

        let chi2 = g.chi_square(|x| f.predict(x, &truth));
        assert!(chi2 < 1.0, "chi2 = {chi2}");

        // Without the x errors the curvature inside the bins dominates.
        let mut no_ex = g.clone();
        for p in &mut no_ex.points {
            p.ex = 0.0;
        }
        assert!(no_ex.chi_square(|x| f.predict(x, &truth)) > 10.0 * chi2.max(1.0));
    }
}
