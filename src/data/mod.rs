//! Built-in market data sources.
//!
//! Only the synthetic generator lives here; real histories come in through `io`.

pub mod sample;

pub use sample::*;
