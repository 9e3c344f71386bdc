//! One-dimensional histogram with the handful of operations the fake-rate
//! combination needs: clone, bin-wise add/subtract, rebin and integral.
//!
//! Under/overflow bins are not carried. Rebinning drops trailing bins that do
//! not fill a complete group (ROOT moves them into the overflow bin, which is
//! never integrated here either).

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Relative tolerance when comparing bin edges of two histograms.
const EDGE_TOL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub name: String,
    pub title: String,
    /// Bin edges, `n_bins + 1` values.
    pub edges: Vec<f64>,
    /// Bin contents, `n_bins` values.
    pub contents: Vec<f64>,
    /// Per-bin sum of squared weights, when stored.
    pub sumw2: Option<Vec<f64>>,
}

impl Histogram {
    /// Build a histogram from edges and contents.
    pub fn new(name: impl Into<String>, edges: Vec<f64>, contents: Vec<f64>) -> Result<Self, AppError> {
        let name = name.into();
        if edges.len() != contents.len() + 1 {
            return Err(AppError::new(
                2,
                format!(
                    "Histogram '{name}' has {} edges for {} bins.",
                    edges.len(),
                    contents.len()
                ),
            ));
        }
        if edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(AppError::new(2, format!("Histogram '{name}' has non-increasing bin edges.")));
        }
        Ok(Self {
            name,
            title: String::new(),
            edges,
            contents,
            sumw2: None,
        })
    }

    /// Uniform binning over `[x_min, x_max)`.
    pub fn uniform(name: impl Into<String>, x_min: f64, x_max: f64, contents: Vec<f64>) -> Result<Self, AppError> {
        let n = contents.len().max(1);
        let width = (x_max - x_min) / n as f64;
        let edges = (0..=n).map(|i| x_min + i as f64 * width).collect();
        Self::new(name, edges, contents)
    }

    pub fn n_bins(&self) -> usize {
        self.contents.len()
    }

    pub fn bin_center(&self, i: usize) -> f64 {
        0.5 * (self.edges[i] + self.edges[i + 1])
    }

    pub fn bin_half_width(&self, i: usize) -> f64 {
        0.5 * (self.edges[i + 1] - self.edges[i])
    }

    /// Sum of bin contents (under/overflow excluded).
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Number of bins with strictly positive content.
    pub fn non_empty_bins(&self) -> usize {
        self.contents.iter().filter(|&&v| v > 0.0).count()
    }

    /// Merge groups of `factor` adjacent bins. A factor of 0 or 1 is a no-op.
    pub fn rebinned(&self, factor: usize) -> Histogram {
        if factor <= 1 {
            return self.clone();
        }
        let n_new = self.n_bins() / factor;
        let contents = (0..n_new)
            .map(|g| self.contents[g * factor..(g + 1) * factor].iter().sum())
            .collect();
        let edges = (0..=n_new).map(|g| self.edges[g * factor]).collect();
        let sumw2 = self.sumw2.as_ref().map(|sw2| {
            (0..n_new)
                .map(|g| sw2[g * factor..(g + 1) * factor].iter().sum())
                .collect()
        });
        Histogram {
            name: self.name.clone(),
            title: self.title.clone(),
            edges,
            contents,
            sumw2,
        }
    }

    /// Bin-wise `self + other`.
    pub fn add(&self, other: &Histogram) -> Result<Histogram, AppError> {
        self.combine(other, 1.0)
    }

    /// Bin-wise `self - other`.
    pub fn sub(&self, other: &Histogram) -> Result<Histogram, AppError> {
        self.combine(other, -1.0)
    }

    fn combine(&self, other: &Histogram, sign: f64) -> Result<Histogram, AppError> {
        self.check_compatible(other)?;
        let contents = self
            .contents
            .iter()
            .zip(&other.contents)
            .map(|(a, b)| a + sign * b)
            .collect();
        // Errors add in quadrature for both sum and difference.
        let sumw2 = match (&self.sumw2, &other.sumw2) {
            (Some(a), Some(b)) => Some(a.iter().zip(b).map(|(x, y)| x + y).collect()),
            (Some(a), None) => Some(a.iter().zip(&other.contents).map(|(x, y)| x + y.abs()).collect()),
            (None, Some(b)) => Some(self.contents.iter().zip(b).map(|(x, y)| x.abs() + y).collect()),
            (None, None) => None,
        };
        Ok(Histogram {
            name: self.name.clone(),
            title: self.title.clone(),
            edges: self.edges.clone(),
            contents,
            sumw2,
        })
    }

    fn check_compatible(&self, other: &Histogram) -> Result<(), AppError> {
        let same = self.edges.len() == other.edges.len()
            && self.edges.iter().zip(&other.edges).all(|(a, b)| {
                (a - b).abs() <= EDGE_TOL * a.abs().max(b.abs()).max(1.0)
            });
        if same {
            Ok(())
        } else {
            Err(AppError::new(
                4,
                format!(
                    "Histograms '{}' and '{}' have incompatible binning.",
                    self.name, other.name
                ),
            ))
        }
    }
}
