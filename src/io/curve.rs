//! Diagnostic JSON bundle.
//!
//! Everything a reviewer needs to audit a run without re-running it:
//! - the per-asset summary table
//! - every bond's 11-point treasury/spread/yield/duration paths and annual returns
//! - per region: anchors, the 11 yearly curve parameters and the fitted 0.5y grids
//! - partial failures as messages

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{AssetFailure, AssetSummary, BondReturnProjection, CurveParameters, Region, TermAnchor};
use crate::error::CmaError;
use crate::projection::RegionCurves;

#[derive(Debug, Serialize)]
pub struct RunBundle<'a> {
    pub tool: &'static str,
    pub as_of: NaiveDate,
    pub summary: &'a [AssetSummary],
    pub bonds: &'a [BondReturnProjection],
    pub regions: BTreeMap<Region, RegionRecord<'a>>,
    pub failures: Vec<FailureRecord>,
}

/// A region's curves, or why they are missing.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionRecord<'a> {
    Fitted {
        anchors: &'a [TermAnchor],
        targets: &'a [TermAnchor],
        params: &'a [CurveParameters],
        fit_errors: &'a [f64],
        grid: &'a [f64],
        curves: &'a [Vec<f64>],
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub asset: String,
    pub error: String,
}

impl<'a> RunBundle<'a> {
    pub fn new(
        as_of: NaiveDate,
        summary: &'a [AssetSummary],
        bonds: &'a [BondReturnProjection],
        curves: &'a BTreeMap<Region, Result<RegionCurves, CmaError>>,
        failures: &[AssetFailure],
    ) -> Self {
        let regions = curves
            .iter()
            .map(|(region, result)| {
                let record = match result {
                    Ok(c) => RegionRecord::Fitted {
                        anchors: &c.anchors,
                        targets: &c.targets,
                        params: &c.params,
                        fit_errors: &c.fit_errors,
                        grid: &c.grid,
                        curves: &c.curves,
                    },
                    Err(e) => RegionRecord::Failed { error: e.to_string() },
                };
                (*region, record)
            })
            .collect();

        Self {
            tool: "cma",
            as_of,
            summary,
            bonds,
            regions,
            failures: failures
                .iter()
                .map(|f| FailureRecord {
                    asset: f.asset.clone(),
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Write the bundle as pretty-printed JSON.
pub fn write_bundle_json(path: &Path, bundle: &RunBundle<'_>) -> Result<(), CmaError> {
    let file = File::create(path)
        .map_err(|e| CmaError::Io(format!("Failed to create bundle JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, bundle)
        .map_err(|e| CmaError::Io(format!("Failed to write bundle JSON: {e}")))
}
