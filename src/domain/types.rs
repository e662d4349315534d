//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed by reference through the risk and projection engines
//! - exported to JSON/CSV for diagnostics
//! - built by hand in tests without any file I/O
//!
//! All rates, yields, spreads and returns are fractional decimals (`0.035` = 3.5%).
//! Percent inputs are converted once, at the I/O boundary.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CmaError;

/// Asset class identifier (the analyst-facing name, e.g. `"U.S. High Yield"`).
pub type AssetId = String;

/// Projection horizon in years.
pub const HORIZON_YEARS: usize = 10;

/// Number of points on an annual path: today plus one per projection year.
pub const PATH_LEN: usize = HORIZON_YEARS + 1;

/// An annual path: index 0 is today, index `y` is the end of projection year `y`.
pub type AnnualPath = [f64; PATH_LEN];

/// A value that is either modeled or explicitly not applicable.
///
/// Replaces the "empty cell means zero" convention: a bond with no default model
/// and a bond with a modeled 0% default rate are different things.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modeled<T> {
    NotApplicable,
    Value(T),
}

impl<T> Modeled<T> {
    pub fn as_ref(&self) -> Modeled<&T> {
        match self {
            Modeled::NotApplicable => Modeled::NotApplicable,
            Modeled::Value(v) => Modeled::Value(v),
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Modeled::NotApplicable => None,
            Modeled::Value(v) => Some(v),
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Modeled::Value(_))
    }
}

impl<T> From<Option<T>> for Modeled<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Modeled::Value(v),
            None => Modeled::NotApplicable,
        }
    }
}

/// Regional treasury curves the bond engine can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Domestic,
    Global,
    GlobalExDomestic,
    Emerging,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::Domestic,
        Region::Global,
        Region::GlobalExDomestic,
        Region::Emerging,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Region::Domestic => "Domestic",
            Region::Global => "Global",
            Region::GlobalExDomestic => "Global ex-Domestic",
            Region::Emerging => "Emerging",
        }
    }

    /// Parse a term-structure tag as analysts write it.
    ///
    /// Accepts the canonical snake_case names plus the legacy `US` / `NonUS` / `EM`
    /// tags. Returns `None` for not-applicable tags (`""`, `"N/A"`).
    pub fn parse_tag(tag: &str) -> Result<Option<Region>, CmaError> {
        let normalized = tag.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let region = match normalized.as_str() {
            "" | "n/a" | "na" | "none" => return Ok(None),
            "domestic" | "us" => Region::Domestic,
            "global" | "nonus" | "non_us" => Region::Global,
            "global_ex_domestic" | "global_ex_us" | "gl_exus" => Region::GlobalExDomestic,
            "emerging" | "em" => Region::Emerging,
            _ => return Err(CmaError::config(format!("Unknown term structure tag '{tag}'."))),
        };
        Ok(Some(region))
    }
}

/// Regression proxy used to backfill an asset's missing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyRef {
    /// Foundational asset, full history, or explicitly exempt from backfill.
    Exempt,
    Proxy(AssetId),
}

impl ProxyRef {
    /// Parse a "beta relative to" cell. `""`, `"N/A"` and `"Building Blocks"` mean exempt.
    pub fn parse(raw: &str) -> ProxyRef {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("n/a")
            || trimmed.eq_ignore_ascii_case("building blocks")
        {
            ProxyRef::Exempt
        } else {
            ProxyRef::Proxy(trimmed.to_string())
        }
    }

    pub fn proxy(&self) -> Option<&str> {
        match self {
            ProxyRef::Exempt => None,
            ProxyRef::Proxy(id) => Some(id),
        }
    }
}

/// Mapping from asset to its backfill proxy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyAssignment {
    entries: BTreeMap<AssetId, ProxyRef>,
}

impl ProxyAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: impl Into<AssetId>, proxy: ProxyRef) {
        self.entries.insert(asset.into(), proxy);
    }

    pub fn get(&self, asset: &str) -> &ProxyRef {
        self.entries.get(asset).unwrap_or(&ProxyRef::Exempt)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &ProxyRef)> {
        self.entries.iter()
    }

    /// Reject proxy chains that revisit an asset.
    pub fn check_acyclic(&self) -> Result<(), CmaError> {
        for start in self.entries.keys() {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut current: &str = start;
            seen.insert(current);
            while let Some(next) = self.get(current).proxy() {
                if !seen.insert(next) {
                    return Err(CmaError::config(format!(
                        "Proxy chain starting at '{start}' revisits '{next}'."
                    )));
                }
                current = next;
            }
        }
        Ok(())
    }
}

impl FromIterator<(AssetId, ProxyRef)> for ProxyAssignment {
    fn from_iter<I: IntoIterator<Item = (AssetId, ProxyRef)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A (duration, yield) observation on a term structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermStructurePoint {
    /// Duration in years (`>= 0`).
    pub duration: f64,
    /// Annual yield (decimal).
    pub yield_: f64,
}

impl TermStructurePoint {
    pub fn new(duration: f64, yield_: f64) -> Self {
        Self { duration, yield_ }
    }
}

/// A labelled treasury observation (e.g. `"10Y"`), as read from the term-structure snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermAnchor {
    pub label: String,
    pub point: TermStructurePoint,
}

/// Fitted single-decay Nelson–Siegel parameters at shape constant `tau`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParameters {
    pub beta0: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub tau: f64,
}

impl CurveParameters {
    pub fn betas(&self) -> [f64; 3] {
        [self.beta0, self.beta1, self.beta2]
    }

    pub fn is_finite(&self) -> bool {
        self.betas().iter().all(|b| b.is_finite()) && self.tau.is_finite()
    }
}

/// Current observed state of one fixed-income asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondSnapshot {
    pub yield_: f64,
    pub spread: f64,
    pub duration: f64,
}

/// How the normalized (long-run) spread of an asset is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpreadTarget {
    /// Mean of the asset's spread history after 5%/95% winsorization.
    #[default]
    Historical,
    /// Analyst-fixed target spread (decimal).
    Fixed { value: f64 },
    /// Inflation-linked bonds: the target sits below nominal treasuries by the
    /// region's expected inflation.
    InflationLinked,
    /// Tax-exempt bonds: target = `(ratio - 1) * normalized treasury yield` at the
    /// asset's duration.
    TaxExempt { ratio: f64 },
}

/// Per-asset population record.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub name: AssetId,
    pub proxy: ProxyRef,
    pub beta_reference: Modeled<AssetId>,
    pub information_ratio: Modeled<f64>,
    pub term_structure: Modeled<Region>,
    /// Annual default rate (decimal).
    pub default_rate: Modeled<f64>,
    /// Recovery rate on default (decimal).
    pub recovery_rate: Modeled<f64>,
    pub spread_target: SpreadTarget,
}

impl AssetRecord {
    /// A record with every optional field not applicable.
    pub fn bare(name: impl Into<AssetId>) -> Self {
        Self {
            name: name.into(),
            proxy: ProxyRef::Exempt,
            beta_reference: Modeled::NotApplicable,
            information_ratio: Modeled::NotApplicable,
            term_structure: Modeled::NotApplicable,
            default_rate: Modeled::NotApplicable,
            recovery_rate: Modeled::NotApplicable,
            spread_target: SpreadTarget::Historical,
        }
    }

    /// Annual return drag from defaults: `default * (1 - recovery)`.
    ///
    /// Zero when either rate is not applicable.
    pub fn default_drag(&self) -> f64 {
        match (&self.default_rate, &self.recovery_rate) {
            (Modeled::Value(d), Modeled::Value(r)) => d * (1.0 - r),
            _ => 0.0,
        }
    }
}

/// Macro assumptions for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionAssumptions {
    pub inflation: f64,
    pub real_cash_rate: f64,
    /// Years for treasury yields to reach their normalized level (0–10).
    pub yield_norm_years: usize,
    /// Years for credit spreads to reach their normalized level (0–10).
    pub spread_norm_years: usize,
    /// Subtracted from the term premium borrowed from the domestic curve.
    pub term_premium_adjust: f64,
    /// Term premium per anchor label (domestic curve only).
    pub term_premiums: BTreeMap<String, f64>,
    /// Synthetic short-rate point prepended to the observed buckets.
    pub short_anchor: Option<TermStructurePoint>,
}

impl RegionAssumptions {
    /// Long-run short rate: inflation plus real cash rate.
    pub fn normalized_short_rate(&self) -> f64 {
        self.inflation + self.real_cash_rate
    }
}

/// Immutable analyst configuration, passed by reference into every engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub as_of: NaiveDate,
    /// Decay parameter λ of the risk weights.
    pub lambda: f64,
    /// Risk weighting window (months).
    pub window: usize,
    /// Curve shape constant τ.
    pub tau: f64,
    /// Scalar on the squared yield change in the annual return approximation.
    pub convexity: f64,
    /// Inflation of the reporting country, if returns are restated locally.
    pub local_inflation: Option<f64>,
    pub regions: BTreeMap<Region, RegionAssumptions>,
    pub assets: Vec<AssetRecord>,
}

impl ModelConfig {
    pub fn region(&self, region: Region) -> Result<&RegionAssumptions, CmaError> {
        self.regions.get(&region).ok_or_else(|| {
            CmaError::config(format!("No assumptions configured for region {}.", region.display_name()))
        })
    }

    pub fn asset(&self, name: &str) -> Option<&AssetRecord> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn proxy_assignment(&self) -> ProxyAssignment {
        self.assets
            .iter()
            .map(|a| (a.name.clone(), a.proxy.clone()))
            .collect()
    }

    /// Structural validation of scalar ranges and cross references.
    pub fn validate(&self) -> Result<(), CmaError> {
        if !(self.lambda.is_finite() && self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(CmaError::config(format!(
                "lambda={} must lie strictly between 0 and 1.",
                self.lambda
            )));
        }
        if self.window < 2 {
            return Err(CmaError::config("window must be at least 2 observations."));
        }
        if !(self.tau.is_finite() && self.tau > 0.0) {
            return Err(CmaError::config(format!("tau={} must be finite and > 0.", self.tau)));
        }
        if !self.convexity.is_finite() {
            return Err(CmaError::config("convexity must be finite."));
        }
        for (region, a) in &self.regions {
            check_horizon(a.yield_norm_years, region, "yield_norm_years")?;
            check_horizon(a.spread_norm_years, region, "spread_norm_years")?;
        }

        let mut names = HashSet::new();
        for asset in &self.assets {
            if !names.insert(asset.name.as_str()) {
                return Err(CmaError::config(format!("Duplicate asset '{}'.", asset.name)));
            }
        }
        for asset in &self.assets {
            if let Some(proxy) = asset.proxy.proxy() {
                if !names.contains(proxy) {
                    return Err(CmaError::config(format!(
                        "Asset '{}' uses unknown proxy '{proxy}'.",
                        asset.name
                    )));
                }
            }
            if let Modeled::Value(reference) = &asset.beta_reference {
                if !names.contains(reference.as_str()) {
                    return Err(CmaError::config(format!(
                        "Asset '{}' has unknown beta reference '{reference}'.",
                        asset.name
                    )));
                }
            }
            if let Modeled::Value(region) = asset.term_structure {
                self.region(region)?;
            }
        }
        self.proxy_assignment().check_acyclic()
    }
}

fn check_horizon(years: usize, region: &Region, field: &str) -> Result<(), CmaError> {
    if years > HORIZON_YEARS {
        return Err(CmaError::config(format!(
            "{}.{field}={years} must be within 0..={HORIZON_YEARS}.",
            region.display_name()
        )));
    }
    Ok(())
}

/// Projected total return of one fixed-income asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondReturnProjection {
    pub asset: AssetId,
    pub region: Region,
    pub treasury_yields: AnnualPath,
    pub spreads: AnnualPath,
    pub yields: AnnualPath,
    pub durations: AnnualPath,
    /// Default-adjusted total return for years 1..=10.
    pub annual_returns: [f64; HORIZON_YEARS],
    pub default_drag: f64,
    /// Geometric annualized expected return.
    pub expected_return: f64,
    /// Mean of the 11-point yield path less default drag.
    pub average_income: f64,
    /// Expected return restated for the reporting country's inflation.
    pub inflation_adjusted_return: Option<f64>,
}

/// One row of the final per-asset table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub asset: AssetId,
    pub annual_volatility: Option<f64>,
    pub beta: Option<f64>,
    pub beta_reference: Option<AssetId>,
    pub region: Option<Region>,
    pub expected_return: Option<f64>,
    pub average_income: Option<f64>,
    pub inflation_adjusted_return: Option<f64>,
}

/// A per-asset failure that did not abort the rest of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFailure {
    pub asset: AssetId,
    pub error: CmaError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_parse_treats_sentinels_as_exempt() {
        assert_eq!(ProxyRef::parse("N/A"), ProxyRef::Exempt);
        assert_eq!(ProxyRef::parse(" Building Blocks "), ProxyRef::Exempt);
        assert_eq!(ProxyRef::parse(""), ProxyRef::Exempt);
        assert_eq!(
            ProxyRef::parse("U.S. Equity"),
            ProxyRef::Proxy("U.S. Equity".to_string())
        );
    }

    #[test]
    fn region_tags_accept_legacy_names() {
        assert_eq!(Region::parse_tag("US").unwrap(), Some(Region::Domestic));
        assert_eq!(Region::parse_tag("NonUS").unwrap(), Some(Region::Global));
        assert_eq!(Region::parse_tag("EM").unwrap(), Some(Region::Emerging));
        assert_eq!(
            Region::parse_tag("global_ex_domestic").unwrap(),
            Some(Region::GlobalExDomestic)
        );
        assert_eq!(Region::parse_tag("N/A").unwrap(), None);
        assert!(Region::parse_tag("Mars").is_err());
    }

    #[test]
    fn proxy_cycle_is_rejected() {
        let assignment: ProxyAssignment = [
            ("A".to_string(), ProxyRef::Proxy("B".to_string())),
            ("B".to_string(), ProxyRef::Proxy("A".to_string())),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            assignment.check_acyclic(),
            Err(CmaError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn default_drag_distinguishes_not_applicable_from_zero() {
        let mut record = AssetRecord::bare("HY");
        assert_eq!(record.default_drag(), 0.0);
        record.default_rate = Modeled::Value(0.035);
        record.recovery_rate = Modeled::Value(0.40);
        assert!((record.default_drag() - 0.021).abs() < 1e-12);
        record.recovery_rate = Modeled::NotApplicable;
        assert_eq!(record.default_drag(), 0.0);
    }
}
