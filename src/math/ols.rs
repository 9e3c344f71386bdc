//! Linear least squares for the parameters that enter the model linearly.
//!
//! For fixed `(mu, sigma)` the fake-rate model is linear in `(scale, offset)`:
//!
//! ```text
//! minimize Σ w_i (y_i - scale·L_i - offset)^2
//! ```
//!
//! Rows are scaled by `sqrt(w_i)` and solved with an SVD, which also handles
//! tall and rank-deficient design matrices (e.g. a very wide Landau that is
//! nearly constant over the fitted range).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser singular value cut-offs.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted variant: minimise `Σ w_i (y_i - x_i^T β)^2`.
///
/// Rows with a non-finite or non-positive weight are dropped.
pub fn solve_weighted(rows: &[Vec<f64>], y: &[f64], w: &[f64]) -> Option<DVector<f64>> {
    let kept: Vec<usize> = (0..rows.len())
        .filter(|&i| w[i].is_finite() && w[i] > 0.0 && y[i].is_finite())
        .collect();
    let p = rows.first()?.len();
    if kept.len() < p {
        return None;
    }

    let mut xw = DMatrix::<f64>::zeros(kept.len(), p);
    let mut yw = DVector::<f64>::zeros(kept.len());
    for (r, &i) in kept.iter().enumerate() {
        let sw = w[i].sqrt();
        for j in 0..p {
            xw[(r, j)] = rows[i][j] * sw;
        }
        yw[r] = y[i] * sw;
    }
    solve_least_squares(&xw, &yw)
}
