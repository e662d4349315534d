//! Linear walk from a current value to a normalized target.
//!
//! With normalization horizon `N`:
//!
//! ```text
//! year 0          current
//! 0 < y < N       current + y · (target - current) / N
//! y >= max(N, 1)  target
//! ```
//!
//! Treasury anchors and credit spreads use the same walk.

use crate::domain::{AnnualPath, HORIZON_YEARS, PATH_LEN};
use crate::error::CmaError;

/// Eleven-point path from `current` to `target` over `horizon` years.
pub fn interpolate_path(current: f64, target: f64, horizon: usize) -> Result<AnnualPath, CmaError> {
    if horizon > HORIZON_YEARS {
        return Err(CmaError::config(format!(
            "Normalization horizon {horizon} must be within 0..={HORIZON_YEARS}."
        )));
    }
    if !(current.is_finite() && target.is_finite()) {
        return Err(CmaError::degenerate(format!(
            "Cannot interpolate between {current} and {target}."
        )));
    }

    let mut path = [target; PATH_LEN];
    path[0] = current;
    let step = if horizon == 0 {
        0.0
    } else {
        (target - current) / horizon as f64
    };
    for (year, slot) in path.iter_mut().enumerate().take(horizon).skip(1) {
        *slot = current + year as f64 * step;
    }
    Ok(path)
}

/// Interpolate several values at once; `out[year][k]` is value `k` at `year`.
pub fn interpolate_many(
    current: &[f64],
    target: &[f64],
    horizon: usize,
) -> Result<Vec<Vec<f64>>, CmaError> {
    if current.len() != target.len() {
        return Err(CmaError::config(format!(
            "{} current values but {} targets.",
            current.len(),
            target.len()
        )));
    }
    let paths = current
        .iter()
        .zip(target)
        .map(|(c, t)| interpolate_path(*c, *t, horizon))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((0..PATH_LEN)
        .map(|year| paths.iter().map(|p| p[year]).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn endpoints_hold_for_every_horizon() {
        for horizon in 0..=HORIZON_YEARS {
            let path = interpolate_path(0.02, 0.045, horizon).unwrap();
            assert_eq!(path[0], 0.02);
            for year in horizon.max(1)..PATH_LEN {
                assert_eq!(path[year], 0.045, "horizon={horizon} year={year}");
            }
        }
    }

    #[test]
    fn ramp_is_linear_and_monotone() {
        let path = interpolate_path(0.01, 0.03, 4).unwrap();
        assert_abs_diff_eq!(path[1], 0.015, epsilon = 1e-15);
        assert_abs_diff_eq!(path[2], 0.020, epsilon = 1e-15);
        assert_abs_diff_eq!(path[3], 0.025, epsilon = 1e-15);
        for pair in path.windows(2) {
            assert!(pair[1] >= pair[0]);
        }

        let falling = interpolate_path(0.05, 0.02, 10).unwrap();
        for pair in falling.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn zero_horizon_jumps_after_year_zero() {
        let path = interpolate_path(0.04, 0.01, 0).unwrap();
        assert_eq!(path[0], 0.04);
        assert!(path[1..].iter().all(|v| *v == 0.01));
    }

    #[test]
    fn horizon_beyond_ten_is_rejected() {
        assert!(matches!(
            interpolate_path(0.0, 1.0, 11),
            Err(CmaError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn many_transposes_to_year_major() {
        let out = interpolate_many(&[0.01, 0.02], &[0.03, 0.02], 2).unwrap();
        assert_eq!(out.len(), PATH_LEN);
        assert_eq!(out[0], vec![0.01, 0.02]);
        assert_abs_diff_eq!(out[1][0], 0.02, epsilon = 1e-15);
        assert_eq!(out[10], vec![0.03, 0.02]);
    }
}
