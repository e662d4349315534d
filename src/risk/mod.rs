//! Exponential risk model.
//!
//! - `weights`: exponential decay weights over the trailing window
//! - `model`: volatility, correlation, covariance, beta and residual risk

pub mod model;
pub mod weights;

pub use model::*;
pub use weights::*;
