//! Regional treasury curves for today and each projection year.
//!
//! Per region:
//!
//! 1. build current anchors (observed buckets, plus an optional short anchor
//!    for non-domestic regions) and normalized target anchors
//! 2. walk every anchor yield from current to target over the region's
//!    yield normalization horizon
//! 3. calibrate one curve per year (11 fits)
//! 4. evaluate each curve on the 0.5y..100y duration grid
//!
//! Domestic targets are the normalized short rate plus a configured term premium
//! per anchor. Other regions borrow their term premium from the fully normalized
//! domestic curve, less a regional adjustment.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::domain::{
    AnnualPath, CurveParameters, ModelConfig, PATH_LEN, Region, RegionAssumptions, TermAnchor,
    TermStructurePoint,
};
use crate::error::CmaError;
use crate::fit::calibrate;
use crate::models::predict_grid;
use crate::projection::interpolate_many;

/// Number of points on the output duration grid.
pub const GRID_LEN: usize = 200;

/// Spacing of the output duration grid (years).
pub const GRID_STEP: f64 = 0.5;

/// Label given to a configured short anchor.
pub const SHORT_ANCHOR_LABEL: &str = "short";

/// Current treasury anchors per region.
pub type TermStructureSnapshot = BTreeMap<Region, Vec<TermAnchor>>;

/// `[0.5, 1.0, ..., 100.0]`.
pub fn duration_grid() -> Vec<f64> {
    (1..=GRID_LEN).map(|k| k as f64 * GRID_STEP).collect()
}

/// Index of the grid point closest to `duration`; ties go to the earlier point.
pub fn nearest_index(grid: &[f64], duration: f64) -> usize {
    let mut best = 0;
    let mut best_gap = f64::INFINITY;
    for (i, d) in grid.iter().enumerate() {
        let gap = (d - duration).abs();
        if gap < best_gap {
            best = i;
            best_gap = gap;
        }
    }
    best
}

/// Fitted curves for one region, today through year 10.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCurves {
    pub region: Region,
    /// Current anchors, sorted by duration.
    pub anchors: Vec<TermAnchor>,
    /// Normalized anchors the walk converges to.
    pub targets: Vec<TermAnchor>,
    pub params: [CurveParameters; PATH_LEN],
    /// Largest in-sample anchor error of each year's fit.
    pub fit_errors: [f64; PATH_LEN],
    pub grid: Vec<f64>,
    /// `curves[year][k]` is the yield at `grid[k]`.
    pub curves: Vec<Vec<f64>>,
}

impl RegionCurves {
    /// Evaluate already-fitted parameters on the duration grid.
    pub fn from_parameters(region: Region, params: [CurveParameters; PATH_LEN]) -> Self {
        let grid = duration_grid();
        let curves = params.iter().map(|p| predict_grid(p, &grid)).collect();
        Self {
            region,
            anchors: Vec::new(),
            targets: Vec::new(),
            params,
            fit_errors: [0.0; PATH_LEN],
            grid,
            curves,
        }
    }

    /// Treasury yield path at the grid point nearest `duration`.
    pub fn yield_path_at(&self, duration: f64) -> AnnualPath {
        let k = nearest_index(&self.grid, duration);
        let mut path = [0.0; PATH_LEN];
        for (year, slot) in path.iter_mut().enumerate() {
            *slot = self.curves[year][k];
        }
        path
    }

    /// Normalized (year 10) yield at the grid point nearest `duration`.
    pub fn target_yield_at(&self, duration: f64) -> f64 {
        self.curves[PATH_LEN - 1][nearest_index(&self.grid, duration)]
    }
}

/// Fit every configured region.
///
/// A region that fails does not stop the others, except that every non-domestic
/// region needs the domestic curve to borrow its term premium from.
pub fn project_regions(
    config: &ModelConfig,
    snapshot: &TermStructureSnapshot,
) -> BTreeMap<Region, Result<RegionCurves, CmaError>> {
    for region in snapshot.keys() {
        if !config.regions.contains_key(region) {
            warn!(
                "Term structure for {} ignored: region has no assumptions.",
                region.display_name()
            );
        }
    }

    let domestic = project_domestic(config, snapshot);
    let others: Vec<(Region, Result<RegionCurves, CmaError>)> = config
        .regions
        .keys()
        .filter(|r| **r != Region::Domestic)
        .copied()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|region| {
            let result = match &domestic {
                Ok(curves) => project_foreign(config, region, snapshot, curves),
                Err(err) => Err(err.context("Domestic curve unavailable")),
            };
            (region, result)
        })
        .collect();

    let mut out = BTreeMap::new();
    if config.regions.contains_key(&Region::Domestic) {
        out.insert(Region::Domestic, domestic);
    }
    out.extend(others);

    for (region, result) in &out {
        match result {
            Ok(curves) => info!(
                "{}: fitted {} curves, worst anchor error {:.2e}",
                region.display_name(),
                PATH_LEN,
                curves.fit_errors.iter().copied().fold(0.0, f64::max)
            ),
            Err(err) => warn!("{}: curve projection failed: {err}", region.display_name()),
        }
    }
    out
}

fn observed_anchors(snapshot: &TermStructureSnapshot, region: Region) -> Result<Vec<TermAnchor>, CmaError> {
    let mut anchors = snapshot.get(&region).cloned().unwrap_or_default();
    if anchors.is_empty() {
        return Err(CmaError::data(format!(
            "No term structure observations for {}.",
            region.display_name()
        )));
    }
    anchors.sort_by(|a, b| a.point.duration.total_cmp(&b.point.duration));
    Ok(anchors)
}

fn project_domestic(config: &ModelConfig, snapshot: &TermStructureSnapshot) -> Result<RegionCurves, CmaError> {
    let assumptions = config.region(Region::Domestic)?;
    let anchors = observed_anchors(snapshot, Region::Domestic)?;
    let short_rate = assumptions.normalized_short_rate();

    let targets = anchors
        .iter()
        .map(|a| {
            let premium = assumptions.term_premiums.get(&a.label).ok_or_else(|| {
                CmaError::config(format!("No domestic term premium configured for anchor '{}'.", a.label))
            })?;
            Ok(TermAnchor {
                label: a.label.clone(),
                point: TermStructurePoint::new(a.point.duration, short_rate + premium),
            })
        })
        .collect::<Result<Vec<_>, CmaError>>()?;

    fit_path(Region::Domestic, config.tau, assumptions, anchors, targets)
}

/// Non-domestic anchors walk toward their short rate plus a premium borrowed from
/// the domestic curve. The premium is read off the fully converged (year 10)
/// domestic curve, not an intermediate year, so it stays the same whatever the
/// domestic yield horizon.
fn project_foreign(
    config: &ModelConfig,
    region: Region,
    snapshot: &TermStructureSnapshot,
    domestic: &RegionCurves,
) -> Result<RegionCurves, CmaError> {
    let assumptions = config.region(region)?;
    let domestic_short = config.region(Region::Domestic)?.normalized_short_rate();

    let mut anchors = Vec::new();
    if let Some(point) = assumptions.short_anchor {
        anchors.push(TermAnchor {
            label: SHORT_ANCHOR_LABEL.to_string(),
            point,
        });
    }
    anchors.extend(observed_anchors(snapshot, region)?);
    anchors.sort_by(|a, b| a.point.duration.total_cmp(&b.point.duration));

    let short_rate = assumptions.normalized_short_rate();
    let targets = anchors
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let premium = if i == 0 {
                0.0
            } else {
                domestic.target_yield_at(a.point.duration) - domestic_short - assumptions.term_premium_adjust
            };
            TermAnchor {
                label: a.label.clone(),
                point: TermStructurePoint::new(a.point.duration, short_rate + premium),
            }
        })
        .collect();

    fit_path(region, config.tau, assumptions, anchors, targets)
}

fn fit_path(
    region: Region,
    tau: f64,
    assumptions: &RegionAssumptions,
    anchors: Vec<TermAnchor>,
    targets: Vec<TermAnchor>,
) -> Result<RegionCurves, CmaError> {
    let context = region.display_name();
    let current: Vec<f64> = anchors.iter().map(|a| a.point.yield_).collect();
    let future: Vec<f64> = targets.iter().map(|a| a.point.yield_).collect();
    let by_year = interpolate_many(&current, &future, assumptions.yield_norm_years)
        .map_err(|e| e.context(context))?;

    let mut params = Vec::with_capacity(PATH_LEN);
    let mut fit_errors = [0.0; PATH_LEN];
    for (year, yields) in by_year.iter().enumerate() {
        let points: Vec<TermStructurePoint> = anchors
            .iter()
            .zip(yields)
            .map(|(a, y)| TermStructurePoint::new(a.point.duration, *y))
            .collect();
        let fit = calibrate(&points, tau).map_err(|e| e.context(format!("{context} year {year}")))?;
        debug!(
            "{context} year {year}: beta=({:.5}, {:.5}, {:.5}) rmse={:.2e}",
            fit.params.beta0, fit.params.beta1, fit.params.beta2, fit.rmse
        );
        fit_errors[year] = fit.max_abs_error;
        params.push(fit.params);
    }

    let params: [CurveParameters; PATH_LEN] = params
        .try_into()
        .map_err(|_| CmaError::degenerate(format!("{context}: expected {PATH_LEN} yearly fits.")))?;

    let mut curves = RegionCurves::from_parameters(region, params);
    curves.anchors = anchors;
    curves.targets = targets;
    curves.fit_errors = fit_errors;
    Ok(curves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetRecord;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn anchor(label: &str, duration: f64, yield_: f64) -> TermAnchor {
        TermAnchor {
            label: label.to_string(),
            point: TermStructurePoint::new(duration, yield_),
        }
    }

    fn assumptions(inflation: f64, real: f64, years: usize) -> RegionAssumptions {
        RegionAssumptions {
            inflation,
            real_cash_rate: real,
            yield_norm_years: years,
            spread_norm_years: years,
            term_premium_adjust: 0.0,
            term_premiums: BTreeMap::new(),
            short_anchor: None,
        }
    }

    fn config() -> ModelConfig {
        let mut domestic = assumptions(0.02, 0.005, 5);
        domestic.term_premiums = [("3M", 0.0), ("2Y", 0.004), ("10Y", 0.012), ("30Y", 0.016)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let mut emerging = assumptions(0.04, 0.01, 3);
        emerging.term_premium_adjust = 0.001;
        emerging.short_anchor = Some(TermStructurePoint::new(0.25, 0.05));

        ModelConfig {
            as_of: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            lambda: 0.99,
            window: 240,
            tau: 1.65,
            convexity: 100.0,
            local_inflation: None,
            regions: [(Region::Domestic, domestic), (Region::Emerging, emerging)]
                .into_iter()
                .collect(),
            assets: vec![AssetRecord::bare("Cash")],
        }
    }

    fn snapshot() -> TermStructureSnapshot {
        [
            (
                Region::Domestic,
                vec![
                    anchor("10Y", 10.0, 0.030),
                    anchor("3M", 0.25, 0.010),
                    anchor("2Y", 2.0, 0.020),
                    anchor("30Y", 30.0, 0.035),
                ],
            ),
            (
                Region::Emerging,
                vec![anchor("2Y", 2.0, 0.06), anchor("5Y", 5.0, 0.065), anchor("10Y", 10.0, 0.07)],
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn grid_spans_half_year_to_century() {
        let grid = duration_grid();
        assert_eq!(grid.len(), GRID_LEN);
        assert_eq!(grid[0], 0.5);
        assert_eq!(grid[GRID_LEN - 1], 100.0);
    }

    #[test]
    fn nearest_index_breaks_ties_toward_first() {
        let grid = duration_grid();
        assert_eq!(nearest_index(&grid, 0.75), 0);
        assert_eq!(nearest_index(&grid, 0.8), 1);
        assert_eq!(nearest_index(&grid, 0.0), 0);
        assert_eq!(nearest_index(&grid, 250.0), GRID_LEN - 1);
        assert_eq!(nearest_index(&grid, 6.3), 12);
    }

    #[test]
    fn domestic_curve_walks_to_premium_targets() {
        let out = project_regions(&config(), &snapshot());
        let domestic = out[&Region::Domestic].as_ref().unwrap();

        assert_eq!(domestic.anchors[0].label, "3M");
        assert_eq!(domestic.curves.len(), PATH_LEN);
        assert!(domestic.curves.iter().all(|c| c.len() == GRID_LEN));

        let ten_year_target = domestic.targets.iter().find(|a| a.label == "10Y").unwrap();
        assert_abs_diff_eq!(ten_year_target.point.yield_, 0.025 + 0.012, epsilon = 1e-15);

        // Years at and beyond the horizon share the same fitted curve.
        for year in 5..PATH_LEN {
            assert_eq!(domestic.params[year], domestic.params[PATH_LEN - 1]);
        }
        assert_ne!(domestic.params[0], domestic.params[PATH_LEN - 1]);
    }

    #[test]
    fn foreign_region_borrows_domestic_premium() {
        let cfg = config();
        let out = project_regions(&cfg, &snapshot());
        let domestic = out[&Region::Domestic].as_ref().unwrap();
        let em = out[&Region::Emerging].as_ref().unwrap();

        assert_eq!(em.anchors[0].label, SHORT_ANCHOR_LABEL);
        assert_abs_diff_eq!(em.targets[0].point.yield_, 0.05, epsilon = 1e-15);

        let expected = 0.05 + domestic.target_yield_at(10.0) - 0.025 - 0.001;
        let ten = em.targets.iter().find(|a| a.label == "10Y").unwrap();
        assert_abs_diff_eq!(ten.point.yield_, expected, epsilon = 1e-15);
    }

    #[test]
    fn borrowed_premium_comes_from_converged_domestic_curve() {
        let mut cfg = config();
        if let Some(d) = cfg.regions.get_mut(&Region::Domestic) {
            d.yield_norm_years = 8;
        }
        let out = project_regions(&cfg, &snapshot());
        let domestic = out[&Region::Domestic].as_ref().unwrap();
        let em = out[&Region::Emerging].as_ref().unwrap();

        let k = nearest_index(&domestic.grid, 10.0);
        let converged = domestic.curves[PATH_LEN - 1][k];
        let midway = domestic.curves[5][k];
        assert!((converged - midway).abs() > 1e-4);

        let ten = em.targets.iter().find(|a| a.label == "10Y").unwrap();
        assert_abs_diff_eq!(ten.point.yield_, 0.05 + converged - 0.025 - 0.001, epsilon = 1e-15);
    }

    #[test]
    fn missing_domestic_premium_fails_every_region() {
        let mut cfg = config();
        if let Some(d) = cfg.regions.get_mut(&Region::Domestic) {
            d.term_premiums.remove("30Y");
        }
        let out = project_regions(&cfg, &snapshot());
        assert!(matches!(out[&Region::Domestic], Err(CmaError::ConfigurationInvalid(_))));
        assert!(out[&Region::Emerging].is_err());
    }

    #[test]
    fn one_region_failing_leaves_others_intact() {
        let mut snap = snapshot();
        snap.insert(Region::Emerging, vec![anchor("10Y", 10.0, 0.07)]);
        let mut cfg = config();
        if let Some(em) = cfg.regions.get_mut(&Region::Emerging) {
            em.short_anchor = None;
        }

        let out = project_regions(&cfg, &snap);
        assert!(out[&Region::Domestic].is_ok());
        assert!(matches!(out[&Region::Emerging], Err(CmaError::DataInsufficient(_))));
    }

    #[test]
    fn flat_parameters_give_flat_paths() {
        let flat = CurveParameters {
            beta0: 0.03,
            beta1: 0.0,
            beta2: 0.0,
            tau: 1.65,
        };
        let curves = RegionCurves::from_parameters(Region::Global, [flat; PATH_LEN]);
        let path = curves.yield_path_at(7.3);
        assert!(path.iter().all(|y| (*y - 0.03).abs() < 1e-15));
        assert_abs_diff_eq!(curves.target_yield_at(7.3), 0.03, epsilon = 1e-15);
    }
}
