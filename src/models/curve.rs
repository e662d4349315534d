//! Curve evaluation for the single-decay Nelson–Siegel yield curve.
//!
//! `y(d) = β0 + β1 · slope(d, τ) + β2 · curvature(d, τ)`
//!
//! The calibrator relies on two primitive operations implemented here:
//! - build a design row for a given duration (for least squares)
//! - predict `y(d)` given fitted parameters (for grids and lookups)

use crate::domain::CurveParameters;
use crate::math::{curvature_loading, slope_loading};

/// Number of linear coefficients.
pub const BETA_LEN: usize = 3;

/// Design row `[1, slope(d), curvature(d)]`; the constant term comes first.
pub fn design_row(duration: f64, tau: f64) -> [f64; BETA_LEN] {
    [
        1.0,
        slope_loading(duration, tau),
        curvature_loading(duration, tau),
    ]
}

/// Predict the yield at `duration`.
pub fn predict(params: &CurveParameters, duration: f64) -> f64 {
    let row = design_row(duration, params.tau);
    params.beta0 * row[0] + params.beta1 * row[1] + params.beta2 * row[2]
}

/// Evaluate the curve on every duration of a grid.
pub fn predict_grid(params: &CurveParameters, grid: &[f64]) -> Vec<f64> {
    grid.iter().map(|&d| predict(params, d)).collect()
}
