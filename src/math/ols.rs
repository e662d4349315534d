//! Least squares solvers.
//!
//! Curve calibration solves a small linear regression:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! The design matrix is tall (more anchors than parameters) and can be close to
//! collinear when anchors bunch up at the short end, so we solve through SVD.
//! (Nalgebra's `QR::solve` is intended for square systems.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser singular-value cutoffs.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fitted line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Number of (x, y) pairs used.
    pub n: usize,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares line through paired observations.
///
/// Returns `None` with fewer than two pairs or when `x` has no dispersion.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let x_bar = xs[..n].iter().sum::<f64>() / nf;
    let y_bar = ys[..n].iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - x_bar;
        sxy += dx * (y - y_bar);
        sxx += dx * dx;
    }
    if sxx <= f64::EPSILON * nf || !sxy.is_finite() {
        return None;
    }

    let slope = sxy / sxx;
    Some(LineFit {
        slope,
        intercept: y_bar - slope * x_bar,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_line_recovers_exact_line() {
        let xs = [0.01, -0.02, 0.03, 0.005];
        let ys: Vec<f64> = xs.iter().map(|x| 1.5 * x + 0.001).collect();
        let fit = fit_line(&xs, &ys).unwrap();
        assert!((fit.slope - 1.5).abs() < 1e-12);
        assert!((fit.intercept - 0.001).abs() < 1e-12);
        assert_eq!(fit.n, 4);
    }

    #[test]
    fn fit_line_needs_two_distinct_points() {
        assert!(fit_line(&[0.01], &[0.02]).is_none());
        assert!(fit_line(&[0.01, 0.01, 0.01], &[0.02, 0.03, 0.01]).is_none());
    }
}
