//! Yield curve calibration at a fixed shape constant.
//!
//! Given anchors `(d_i, y_i)` and τ, the curve is linear in `(β0, β1, β2)`, so
//! calibration is one ordinary least squares solve: no search over τ, no
//! iteration. The same routine fits today's curve and every projected year.

use nalgebra::{DMatrix, DVector};

use crate::domain::{CurveParameters, TermStructurePoint};
use crate::error::CmaError;
use crate::math::solve_least_squares;
use crate::models::{BETA_LEN, design_row, predict};

/// Calibrated parameters plus in-sample fit diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveFit {
    pub params: CurveParameters,
    pub rmse: f64,
    pub max_abs_error: f64,
    pub n: usize,
}

/// Fit `(β0, β1, β2)` to a term structure at shape constant `tau`.
///
/// Zero durations are allowed (the loadings take their `d → 0` limits).
pub fn calibrate(points: &[TermStructurePoint], tau: f64) -> Result<CurveFit, CmaError> {
    if !(tau.is_finite() && tau > 0.0) {
        return Err(CmaError::config(format!("Curve shape constant tau={tau} must be finite and > 0.")));
    }
    if points.len() < BETA_LEN {
        return Err(CmaError::data(format!(
            "Curve calibration needs at least {BETA_LEN} term structure points, got {}.",
            points.len()
        )));
    }
    if let Some(p) = points
        .iter()
        .find(|p| !(p.duration.is_finite() && p.duration >= 0.0 && p.yield_.is_finite()))
    {
        return Err(CmaError::data(format!(
            "Unusable term structure point (duration={}, yield={}).",
            p.duration, p.yield_
        )));
    }

    let n = points.len();
    let mut x = DMatrix::<f64>::zeros(n, BETA_LEN);
    let mut y = DVector::<f64>::zeros(n);
    for (i, p) in points.iter().enumerate() {
        let row = design_row(p.duration, tau);
        for (j, v) in row.iter().enumerate() {
            x[(i, j)] = *v;
        }
        y[i] = p.yield_;
    }

    let beta = solve_least_squares(&x, &y)
        .ok_or_else(|| CmaError::degenerate("Curve least squares system could not be solved."))?;
    let params = CurveParameters {
        beta0: beta[0],
        beta1: beta[1],
        beta2: beta[2],
        tau,
    };
    if !params.is_finite() {
        return Err(CmaError::degenerate(format!(
            "Curve fit produced non-finite parameters {:?}.",
            params.betas()
        )));
    }

    let mut sse = 0.0;
    let mut max_abs_error: f64 = 0.0;
    for p in points {
        let r = p.yield_ - predict(&params, p.duration);
        sse += r * r;
        max_abs_error = max_abs_error.max(r.abs());
    }

    Ok(CurveFit {
        params,
        rmse: (sse / n as f64).sqrt(),
        max_abs_error,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn points(durations: &[f64], yields: &[f64]) -> Vec<TermStructurePoint> {
        durations
            .iter()
            .zip(yields)
            .map(|(&d, &y)| TermStructurePoint::new(d, y))
            .collect()
    }

    #[test]
    fn recovers_known_parameters() {
        let truth = CurveParameters {
            beta0: 0.045,
            beta1: -0.02,
            beta2: 0.015,
            tau: 1.65,
        };
        let durations = [0.25, 1.0, 2.0, 5.0, 7.0, 10.0, 20.0, 30.0];
        let yields: Vec<f64> = durations.iter().map(|&d| predict(&truth, d)).collect();

        let fit = calibrate(&points(&durations, &yields), 1.65).unwrap();
        assert_abs_diff_eq!(fit.params.beta0, truth.beta0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.params.beta1, truth.beta1, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.params.beta2, truth.beta2, epsilon = 1e-10);
        assert!(fit.max_abs_error < 1e-12);
    }

    #[test]
    fn zero_duration_anchor_is_handled() {
        let truth = CurveParameters {
            beta0: 0.03,
            beta1: -0.01,
            beta2: 0.005,
            tau: 1.65,
        };
        let durations = [0.0, 2.0, 10.0, 30.0];
        let yields: Vec<f64> = durations.iter().map(|&d| predict(&truth, d)).collect();

        let fit = calibrate(&points(&durations, &yields), 1.65).unwrap();
        assert!(fit.params.is_finite());
        assert_abs_diff_eq!(fit.params.beta0 + fit.params.beta1, 0.02, epsilon = 1e-10);
    }

    #[test]
    fn four_point_treasury_curve_is_reproduced() {
        // Least squares on these four anchors leaves a largest residual of
        // about 1.08e-3 (at 10y); three parameters cannot pass through all four.
        let durations = [0.25, 2.0, 10.0, 30.0];
        let yields = [0.01, 0.02, 0.03, 0.035];
        let fit = calibrate(&points(&durations, &yields), 1.65).unwrap();

        assert!(fit.params.is_finite());
        for (&d, &y) in durations.iter().zip(&yields) {
            assert!((predict(&fit.params, d) - y).abs() < 1.1e-3, "d={d}");
        }
        assert_abs_diff_eq!(fit.params.beta0, 0.035855, epsilon = 1e-5);
        assert_abs_diff_eq!(fit.params.beta1, -0.027565, epsilon = 1e-5);
    }

    #[test]
    fn too_few_points_is_data_insufficient() {
        let err = calibrate(&points(&[1.0, 5.0], &[0.01, 0.02]), 1.65).unwrap_err();
        assert!(matches!(err, CmaError::DataInsufficient(_)));
    }

    #[test]
    fn invalid_tau_is_configuration_error() {
        let p = points(&[1.0, 5.0, 10.0], &[0.01, 0.02, 0.03]);
        assert!(matches!(calibrate(&p, 0.0), Err(CmaError::ConfigurationInvalid(_))));
        assert!(matches!(calibrate(&p, f64::NAN), Err(CmaError::ConfigurationInvalid(_))));
    }
}
