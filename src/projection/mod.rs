//! Term-structure projection.
//!
//! - `interpolate`: the current-to-normalized walk shared by yields and spreads
//! - `curves`: per-region yearly curve fits and the 0.5y duration grid
//! - `bonds`: bond total-return simulation on top of the regional curves

pub mod bonds;
pub mod curves;
pub mod interpolate;

pub use bonds::*;
pub use curves::*;
pub use interpolate::*;
