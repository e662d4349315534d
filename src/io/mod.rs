//! Input/output at the file boundary.
//!
//! - analyst configuration JSON (`config`)
//! - CSV ingest of histories and snapshots (`ingest`)
//! - summary CSV export (`export`)
//! - diagnostic JSON bundle (`curve`)

pub mod config;
pub mod curve;
pub mod export;
pub mod ingest;

pub use config::*;
pub use curve::*;
pub use export::*;
pub use ingest::*;
