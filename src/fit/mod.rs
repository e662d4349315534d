//! Curve calibration.
//!
//! One responsibility: turn a term structure into fitted curve parameters at a
//! fixed shape constant. Year-by-year orchestration lives in `projection`.

pub mod calibrate;

pub use calibrate::*;
