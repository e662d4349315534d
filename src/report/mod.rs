//! Terminal reporting for a run: backfill fits, risk, curves, bonds and failures.

pub mod format;

pub use format::*;
