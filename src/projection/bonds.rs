//! Bond total-return simulation over the ten-year horizon.
//!
//! For an asset with duration `D` on its region's curve:
//!
//! ```text
//! spread[y] = walk(current spread → normalized spread, spread horizon)
//! yield[0]  = current yield
//! yield[y]  = treasury[y] + spread[y]
//! r[y]      = yield[y-1] - ΔY·D + c·ΔY² - drag        ΔY = yield[y] - yield[y-1]
//! expected  = (∏ (1 + r[y]))^(1/10) - 1
//! ```
//!
//! `c` is the model's convexity constant and `drag = default · (1 - recovery)`.

use std::collections::BTreeMap;

use log::{debug, warn};
use rayon::prelude::*;

use crate::domain::{
    AnnualPath, AssetFailure, AssetId, AssetRecord, BondReturnProjection, BondSnapshot, HORIZON_YEARS,
    Modeled, ModelConfig, PATH_LEN, Region, RegionAssumptions, SpreadTarget,
};
use crate::error::CmaError;
use crate::math::winsorized_mean;
use crate::projection::{RegionCurves, interpolate_path};

/// Share of observations clipped on each tail of the spread history.
pub const SPREAD_WINSOR_LIMIT: f64 = 0.05;

/// Historical spread observations per asset (missing periods dropped).
pub type SpreadHistory = BTreeMap<AssetId, Vec<f64>>;

/// Projections for every bond asset, plus the ones that could not be simulated.
#[derive(Debug, Clone, Default)]
pub struct BondRun {
    pub projections: Vec<BondReturnProjection>,
    pub failures: Vec<AssetFailure>,
}

/// Normalized spread the asset converges to.
pub fn spread_target(
    record: &AssetRecord,
    snapshot: &BondSnapshot,
    history: Option<&[f64]>,
    curves: &RegionCurves,
    region: &RegionAssumptions,
) -> Result<f64, CmaError> {
    match &record.spread_target {
        SpreadTarget::Historical => {
            let history = history.unwrap_or(&[]);
            winsorized_mean(history, SPREAD_WINSOR_LIMIT, SPREAD_WINSOR_LIMIT).ok_or_else(|| {
                CmaError::data(format!("'{}' has no spread history to normalize.", record.name))
            })
        }
        SpreadTarget::Fixed { value } => Ok(*value),
        SpreadTarget::InflationLinked => Ok(-region.inflation),
        SpreadTarget::TaxExempt { ratio } => Ok((ratio - 1.0) * curves.target_yield_at(snapshot.duration)),
    }
}

/// Simulate one bond asset against its region's curves.
pub fn simulate_bond(
    record: &AssetRecord,
    snapshot: &BondSnapshot,
    history: Option<&[f64]>,
    curves: &RegionCurves,
    region: &RegionAssumptions,
    config: &ModelConfig,
) -> Result<BondReturnProjection, CmaError> {
    if !(snapshot.duration.is_finite() && snapshot.duration >= 0.0) {
        return Err(CmaError::data(format!(
            "'{}' has unusable duration {}.",
            record.name, snapshot.duration
        )));
    }

    let target = spread_target(record, snapshot, history, curves, region)?;
    let spreads = interpolate_path(snapshot.spread, target, region.spread_norm_years)?;
    let treasury_yields = curves.yield_path_at(snapshot.duration);

    let mut yields: AnnualPath = [0.0; PATH_LEN];
    yields[0] = snapshot.yield_;
    for year in 1..PATH_LEN {
        yields[year] = treasury_yields[year] + spreads[year];
    }
    let durations: AnnualPath = [snapshot.duration; PATH_LEN];

    let default_drag = record.default_drag();
    let mut annual_returns = [0.0; HORIZON_YEARS];
    for (i, r) in annual_returns.iter_mut().enumerate() {
        let change = yields[i + 1] - yields[i];
        *r = yields[i] - change * durations[i] + config.convexity * change * change - default_drag;
    }

    let expected_return = geometric_mean(&annual_returns).map_err(|e| e.context(format!("'{}'", record.name)))?;
    let average_income = yields.iter().sum::<f64>() / PATH_LEN as f64 - default_drag;

    let inflation_adjusted_return = config
        .local_inflation
        .map(|local| expected_return + local - region.inflation);

    debug!(
        "'{}': expected={expected_return:.4} income={average_income:.4} drag={default_drag:.4}",
        record.name
    );

    Ok(BondReturnProjection {
        asset: record.name.clone(),
        region: curves.region,
        treasury_yields,
        spreads,
        yields,
        durations,
        annual_returns,
        default_drag,
        expected_return,
        average_income,
        inflation_adjusted_return,
    })
}

/// `(∏ (1 + r))^(1/n) - 1`.
pub fn geometric_mean(returns: &[f64]) -> Result<f64, CmaError> {
    if returns.is_empty() {
        return Err(CmaError::data("No annual returns to annualize."));
    }
    let mut log_sum = 0.0;
    for r in returns {
        let growth = 1.0 + r;
        if !(growth.is_finite() && growth > 0.0) {
            return Err(CmaError::degenerate(format!(
                "Annual return {r} wipes out the position; geometric mean undefined."
            )));
        }
        log_sum += growth.ln();
    }
    Ok((log_sum / returns.len() as f64).exp() - 1.0)
}

/// Simulate every asset that is mapped to a term structure region.
///
/// Assets whose region failed to calibrate, or that lack a snapshot, become
/// failures; the rest are simulated in parallel.
pub fn simulate_all(
    config: &ModelConfig,
    snapshots: &BTreeMap<AssetId, BondSnapshot>,
    spreads: &SpreadHistory,
    curves: &BTreeMap<Region, Result<RegionCurves, CmaError>>,
) -> BondRun {
    let results: Vec<Result<BondReturnProjection, AssetFailure>> = config
        .assets
        .par_iter()
        .filter_map(|record| match record.term_structure {
            Modeled::NotApplicable => None,
            Modeled::Value(region) => Some((record, region)),
        })
        .map(|(record, region)| {
            simulate_mapped(config, record, region, snapshots, spreads, curves).map_err(|error| {
                warn!("Bond projection for '{}' failed: {error}", record.name);
                AssetFailure {
                    asset: record.name.clone(),
                    error,
                }
            })
        })
        .collect();

    let mut run = BondRun::default();
    for result in results {
        match result {
            Ok(p) => run.projections.push(p),
            Err(f) => run.failures.push(f),
        }
    }
    run
}

fn simulate_mapped(
    config: &ModelConfig,
    record: &AssetRecord,
    region: Region,
    snapshots: &BTreeMap<AssetId, BondSnapshot>,
    spreads: &SpreadHistory,
    curves: &BTreeMap<Region, Result<RegionCurves, CmaError>>,
) -> Result<BondReturnProjection, CmaError> {
    let region_curves = match curves.get(&region) {
        Some(Ok(c)) => c,
        Some(Err(err)) => return Err(err.context(format!("{} curve", region.display_name()))),
        None => {
            return Err(CmaError::config(format!(
                "No curves were projected for {}.",
                region.display_name()
            )));
        }
    };
    let snapshot = snapshots
        .get(&record.name)
        .ok_or_else(|| CmaError::data(format!("No yield/spread/duration snapshot for '{}'.", record.name)))?;
    let assumptions = config.region(region)?;
    let history = spreads.get(&record.name).map(Vec::as_slice);

    simulate_bond(record, snapshot, history, region_curves, assumptions, config)
}
