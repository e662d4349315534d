//! Exponential decay weights for the risk window.
//!
//! For decay λ and a window of `n` observations (index 0 = oldest):
//!
//! ```text
//! raw_k = (1 - λ) · λ^(n - 1 - k)
//! w_k   = raw_k / Σ raw
//! ```
//!
//! so weights sum to one and increase toward the most recent observation.
//! Weights are a pure function of `(λ, n)` and are memoized process-wide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::CmaError;

/// Default window: 20 years of monthly observations.
pub const DEFAULT_WINDOW: usize = 240;

/// Normalized decay weights, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayWeights {
    lambda: f64,
    weights: Vec<f64>,
}

type WeightCache = Mutex<HashMap<(u64, usize), Arc<DecayWeights>>>;

static CACHE: OnceLock<WeightCache> = OnceLock::new();

impl DecayWeights {
    pub fn new(lambda: f64, window: usize) -> Result<Self, CmaError> {
        if !(lambda.is_finite() && lambda > 0.0 && lambda < 1.0) {
            return Err(CmaError::config(format!(
                "Decay lambda={lambda} must lie strictly between 0 and 1."
            )));
        }
        if window == 0 {
            return Err(CmaError::config("Weighting window must be positive."));
        }

        let raw: Vec<f64> = (0..window)
            .map(|k| (1.0 - lambda) * lambda.powi((window - 1 - k) as i32))
            .collect();
        let total: f64 = raw.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(CmaError::degenerate(format!(
                "Decay weights for lambda={lambda}, window={window} do not normalize."
            )));
        }

        Ok(Self {
            lambda,
            weights: raw.into_iter().map(|w| w / total).collect(),
        })
    }

    /// Memoized weights for `(lambda, window)`.
    pub fn shared(lambda: f64, window: usize) -> Result<Arc<Self>, CmaError> {
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let key = (lambda.to_bits(), window);
        let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = guard.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let weights = Arc::new(Self::new(lambda, window)?);
        guard.insert(key, Arc::clone(&weights));
        Ok(weights)
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Lags after which an observation's weight halves: `ln(0.5) / ln(λ)`.
    pub fn half_life(&self) -> f64 {
        0.5_f64.ln() / self.lambda.ln()
    }

    /// Weighted sum `Σ w_k x_k`.
    pub fn dot(&self, values: &[f64]) -> f64 {
        self.weights.iter().zip(values).map(|(w, x)| w * x).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_and_increase() {
        for &lambda in &[0.5, 0.9, 0.94, 0.97, 0.99, 0.999] {
            let w = DecayWeights::new(lambda, DEFAULT_WINDOW).unwrap();
            assert_eq!(w.len(), DEFAULT_WINDOW);
            let total: f64 = w.as_slice().iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "lambda={lambda} total={total}");
            for pair in w.as_slice().windows(2) {
                assert!(pair[1] > pair[0], "lambda={lambda}");
            }
        }
    }

    #[test]
    fn neighbouring_weights_differ_by_lambda() {
        let w = DecayWeights::new(0.99, 12).unwrap();
        let s = w.as_slice();
        for pair in s.windows(2) {
            assert!((pair[0] / pair[1] - 0.99).abs() < 1e-12);
        }
    }

    #[test]
    fn lambda_outside_unit_interval_is_rejected() {
        for &lambda in &[0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                DecayWeights::new(lambda, 240),
                Err(CmaError::ConfigurationInvalid(_))
            ));
        }
    }

    #[test]
    fn shared_weights_are_memoized() {
        let a = DecayWeights::shared(0.985, 120).unwrap();
        let b = DecayWeights::shared(0.985, 120).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = DecayWeights::shared(0.985, 60).unwrap();
        assert_eq!(c.len(), 60);
    }
}
