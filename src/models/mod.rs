//! Yield curve model evaluation.
//!
//! Kept as small, pure functions so that the calibrator and the path projector
//! share one definition of the curve.

pub mod curve;

pub use curve::*;
