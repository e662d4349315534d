//! `cma-engine` library crate.
//!
//! The binary (`cma`) is a thin wrapper around this library so that:
//!
//! - the risk and term-structure engines are testable without spawning processes
//! - file ingest and reporting stay at the edges
//!
//! Layout, bottom-up: `math` and `models` hold the curve basis and least squares,
//! `fit` calibrates curves, `risk`, `backfill` and `projection` are the engines,
//! `io` and `report` are the boundary, `app` wires them together.

pub mod app;
pub mod backfill;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod projection;
pub mod report;
pub mod risk;
