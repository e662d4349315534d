//! Domain types used throughout the engines.
//!
//! This module defines:
//!
//! - configuration records (`ModelConfig`, `RegionAssumptions`, `AssetRecord`)
//! - historical inputs (`ReturnPanel`, `BondSnapshot`, `TermAnchor`)
//! - engine outputs (`CurveParameters`, `BondReturnProjection`, `AssetFailure`)

pub mod panel;
pub mod types;

pub use panel::*;
pub use types::*;
