//! Factor loadings of the single-decay Nelson–Siegel curve.
//!
//! For duration `d` and shape constant `τ`, with `x = d/τ`:
//!
//! - slope loading:     `(τ/d) · (1 - e^(-x))`
//! - curvature loading: `(τ/d) · (1 - (1 + x) · e^(-x))`, i.e. slope loading minus `e^(-x)`
//!
//! Numerical notes:
//! - For small `x`, `1 - exp(-x)` suffers from catastrophic cancellation, so we use
//!   `expm1` and a series fallback.
//! - At `d = 0` the loadings take their limits: slope → 1, curvature → 0. A zero
//!   duration (e.g. an overnight cash point) is therefore a valid input.

/// Below this `x = d/τ` we switch to the series expansion.
const SMALL_X: f64 = 1e-6;

/// Slope loading `(1 - e^(-x)) / x`.
pub fn slope_loading(duration: f64, tau: f64) -> f64 {
    let x = duration.max(0.0) / tau;
    if x < SMALL_X {
        // (1 - e^{-x}) / x ≈ 1 - x/2 + x^2/6
        return 1.0 - x / 2.0 + (x * x) / 6.0;
    }
    -(-x).exp_m1() / x
}

/// Curvature loading `(1 - e^(-x)) / x - e^(-x)`.
pub fn curvature_loading(duration: f64, tau: f64) -> f64 {
    let x = duration.max(0.0) / tau;
    if x < SMALL_X {
        // slope ≈ 1 - x/2 + x^2/6, e^{-x} ≈ 1 - x + x^2/2
        return x / 2.0 - (x * x) / 3.0;
    }
    slope_loading(duration, tau) - (-x).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loadings_take_limits_at_zero_duration() {
        let tau = 1.65;
        assert_eq!(slope_loading(0.0, tau), 1.0);
        assert_eq!(curvature_loading(0.0, tau), 0.0);
        assert!((slope_loading(1e-12, tau) - 1.0).abs() < 1e-9);
        assert!(curvature_loading(1e-12, tau).abs() < 1e-9);
    }

    #[test]
    fn loadings_match_closed_form() {
        let tau = 1.65;
        for &d in &[0.25, 2.0, 10.0, 30.0, 100.0] {
            let x: f64 = d / tau;
            let slope = (tau / d) * (1.0 - (-x).exp());
            let curvature = (tau / d) * (1.0 - (1.0 + x) * (-x).exp());
            assert!((slope_loading(d, tau) - slope).abs() < 1e-12);
            assert!((curvature_loading(d, tau) - curvature).abs() < 1e-12);
        }
    }
}
