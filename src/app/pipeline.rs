//! Shared pipeline logic used by every subcommand.
//!
//! Two independent legs joined only at the final summary:
//!
//! - returns: backfill -> exponential risk model -> betas
//! - rates: regional curve calibration -> yearly projection -> bond simulation
//!
//! Per-asset and per-region problems become `AssetFailure`s; only structural
//! configuration errors abort a leg.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::backfill::{BackfillReport, backfill};
use crate::domain::{
    AssetFailure, AssetId, AssetSummary, BondSnapshot, Modeled, ModelConfig, Region, ReturnPanel,
};
use crate::error::CmaError;
use crate::projection::{BondRun, RegionCurves, SpreadHistory, TermStructureSnapshot, project_regions, simulate_all};
use crate::risk::{self, DecayWeights, RiskEstimate};

/// Everything the engines consume besides the configuration.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub returns: ReturnPanel,
    pub spreads: SpreadHistory,
    pub bonds: BTreeMap<AssetId, BondSnapshot>,
    pub term_structure: TermStructureSnapshot,
}

/// Output of the returns leg.
#[derive(Debug, Clone)]
pub struct RiskStage {
    /// Panel after backfill.
    pub panel: ReturnPanel,
    pub backfill: BackfillReport,
    /// `None` when no asset had a complete trailing window.
    pub estimate: Option<RiskEstimate>,
    pub betas: Vec<(AssetId, Result<Modeled<f64>, CmaError>)>,
    pub failures: Vec<AssetFailure>,
}

/// All computed outputs of a full run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub risk: RiskStage,
    pub curves: BTreeMap<Region, Result<RegionCurves, CmaError>>,
    pub bonds: BondRun,
    pub summary: Vec<AssetSummary>,
    /// Every partial failure of the run, returns leg first.
    pub failures: Vec<AssetFailure>,
}

/// Backfill the panel, then estimate risk on every asset with a full window.
pub fn run_risk(config: &ModelConfig, mut panel: ReturnPanel) -> Result<RiskStage, CmaError> {
    let report = backfill(&mut panel, &config.proxy_assignment())?;
    info!(
        "Backfill: {} assets fitted, {} periods filled, {} failures",
        report.fits.len(),
        report.filled_total(),
        report.failures.len()
    );

    let weights = DecayWeights::shared(config.lambda, config.window)?;
    let mut failures = report.failures.clone();
    let mut usable = Vec::new();
    for asset in panel.assets() {
        match panel.trailing(asset, weights.len()) {
            Ok(_) => usable.push(asset.clone()),
            Err(error) => {
                warn!("Excluded from risk model: {error}");
                failures.push(AssetFailure {
                    asset: asset.clone(),
                    error,
                });
            }
        }
    }

    let estimate = if usable.is_empty() {
        warn!("No asset has a complete {}-period window; risk model skipped.", weights.len());
        None
    } else {
        let est = risk::estimate(&panel.subset(&usable)?, &weights)?;
        info!(
            "Risk model: {} assets, lambda={} (half-life {:.1} months), {} degenerate",
            est.assets().len(),
            weights.lambda(),
            weights.half_life(),
            est.degenerate.len()
        );
        Some(est)
    };

    let betas = match &estimate {
        Some(est) => est.betas(&config.assets),
        None => Vec::new(),
    };
    for (asset, beta) in &betas {
        if let Err(error) = beta {
            failures.push(AssetFailure {
                asset: asset.clone(),
                error: error.clone(),
            });
        }
    }

    Ok(RiskStage {
        panel,
        backfill: report,
        estimate,
        betas,
        failures,
    })
}

/// Fit and project every configured region's curves.
pub fn run_curves(
    config: &ModelConfig,
    term_structure: &TermStructureSnapshot,
) -> BTreeMap<Region, Result<RegionCurves, CmaError>> {
    let curves = project_regions(config, term_structure);
    let fitted = curves.values().filter(|c| c.is_ok()).count();
    info!("Curves: {fitted} of {} regions fitted", curves.len());
    curves
}

/// Run both legs and assemble the per-asset summary.
pub fn run_all(config: &ModelConfig, market: MarketData) -> Result<RunOutput, CmaError> {
    let MarketData {
        returns,
        spreads,
        bonds,
        term_structure,
    } = market;

    let risk = run_risk(config, returns)?;
    let curves = run_curves(config, &term_structure);
    let bond_run = simulate_all(config, &bonds, &spreads, &curves);
    info!(
        "Bonds: {} projected, {} failed",
        bond_run.projections.len(),
        bond_run.failures.len()
    );

    let summary = summarize(config, &risk, &bond_run);
    let mut failures = risk.failures.clone();
    failures.extend(bond_run.failures.iter().cloned());

    Ok(RunOutput {
        risk,
        curves,
        bonds: bond_run,
        summary,
        failures,
    })
}

/// One row per configured asset, in configuration order.
pub fn summarize(config: &ModelConfig, risk: &RiskStage, bonds: &BondRun) -> Vec<AssetSummary> {
    let betas: BTreeMap<&str, f64> = risk
        .betas
        .iter()
        .filter_map(|(a, b)| match b {
            Ok(Modeled::Value(v)) => Some((a.as_str(), *v)),
            _ => None,
        })
        .collect();
    let projections: BTreeMap<&str, _> = bonds.projections.iter().map(|p| (p.asset.as_str(), p)).collect();

    config
        .assets
        .iter()
        .map(|record| {
            let bond = projections.get(record.name.as_str());
            AssetSummary {
                asset: record.name.clone(),
                annual_volatility: risk.estimate.as_ref().and_then(|e| e.annual_sigma_of(&record.name)),
                beta: betas.get(record.name.as_str()).copied(),
                beta_reference: record.beta_reference.clone().value(),
                region: record.term_structure.clone().value(),
                expected_return: bond.map(|p| p.expected_return),
                average_income: bond.map(|p| p.average_income),
                inflation_adjusted_return: bond.and_then(|p| p.inflation_adjusted_return),
            }
        })
        .collect()
}
