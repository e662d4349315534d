//! Analyst configuration JSON.
//!
//! Rates in the file are quoted in percent (`2.5` = 2.5%) the way analysts enter
//! them; they are converted to decimals exactly once, here. Any optional cell may
//! be `"N/A"` (or empty), which becomes `Modeled::NotApplicable` rather than 0.
//!
//! ```json
//! {
//!   "as_of": "2024-12-31",
//!   "lambda": 0.99,
//!   "regions": {
//!     "domestic": { "inflation": 2.5, "real_cash_rate": 0.5, "yield_norm_years": 5,
//!                   "spread_norm_years": 3, "term_premiums": { "10Y": 1.2 } }
//!   },
//!   "assets": [
//!     { "name": "U.S. High Yield", "proxy": "N/A", "term_structure": "US",
//!       "default_rate": 3.5, "recovery_rate": 40 }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{
    AssetRecord, HORIZON_YEARS, Modeled, ModelConfig, ProxyRef, Region, RegionAssumptions, SpreadTarget,
    TermStructurePoint,
};
use crate::error::CmaError;
use crate::risk::DEFAULT_WINDOW;

pub const DEFAULT_TAU: f64 = 1.65;
pub const DEFAULT_CONVEXITY: f64 = 100.0;

/// A spreadsheet-style cell: a number, or text such as `"N/A"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn is_not_applicable(text: &str) -> bool {
        let t = text.trim();
        t.is_empty() || t.eq_ignore_ascii_case("n/a") || t.eq_ignore_ascii_case("na")
    }

    /// Numeric value scaled by `scale`, or `NotApplicable`.
    fn number(&self, field: &str, scale: f64) -> Result<Modeled<f64>, CmaError> {
        match self {
            Cell::Number(v) if v.is_finite() => Ok(Modeled::Value(v * scale)),
            Cell::Number(v) => Err(CmaError::config(format!("{field}: non-finite value {v}."))),
            Cell::Text(t) if Self::is_not_applicable(t) => Ok(Modeled::NotApplicable),
            Cell::Text(t) => t
                .trim()
                .trim_end_matches('%')
                .parse::<f64>()
                .map(|v| Modeled::Value(v * scale))
                .map_err(|_| CmaError::config(format!("{field}: expected a number or \"N/A\", got '{t}'."))),
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Cell::Text(t) if !Self::is_not_applicable(t) => Some(t.trim().to_string()),
            Cell::Text(_) => None,
            Cell::Number(v) => Some(v.to_string()),
        }
    }
}

fn na() -> Cell {
    Cell::Text("N/A".to_string())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub as_of: NaiveDate,
    pub lambda: f64,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_tau")]
    pub tau: f64,
    #[serde(default = "default_convexity")]
    pub convexity: f64,
    /// Percent.
    #[serde(default)]
    pub local_inflation: Option<f64>,
    pub regions: BTreeMap<String, RawRegion>,
    #[serde(default)]
    pub assets: Vec<RawAsset>,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_tau() -> f64 {
    DEFAULT_TAU
}

fn default_convexity() -> f64 {
    DEFAULT_CONVEXITY
}

/// Region block; every rate in percent.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRegion {
    pub inflation: f64,
    pub real_cash_rate: f64,
    /// Years; range-checked by `horizon`.
    pub yield_norm_years: i64,
    pub spread_norm_years: i64,
    #[serde(default)]
    pub term_premium_adjust: f64,
    #[serde(default)]
    pub term_premiums: BTreeMap<String, f64>,
    #[serde(default)]
    pub short_anchor: Option<RawPoint>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPoint {
    pub duration: f64,
    /// Percent.
    #[serde(rename = "yield")]
    pub yield_: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawSpreadTarget {
    Historical,
    /// Percent.
    Fixed { value: f64 },
    InflationLinked,
    TaxExempt { ratio: f64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAsset {
    pub name: String,
    #[serde(default = "na")]
    pub proxy: Cell,
    #[serde(default = "na")]
    pub beta_reference: Cell,
    #[serde(default = "na")]
    pub information_ratio: Cell,
    #[serde(default = "na")]
    pub term_structure: Cell,
    /// Percent.
    #[serde(default = "na")]
    pub default_rate: Cell,
    /// Percent.
    #[serde(default = "na")]
    pub recovery_rate: Cell,
    #[serde(default)]
    pub spread_target: Option<RawSpreadTarget>,
}

/// Read and validate a configuration file.
pub fn load_config(path: &Path) -> Result<ModelConfig, CmaError> {
    let file = File::open(path)
        .map_err(|e| CmaError::Io(format!("Failed to open config '{}': {e}", path.display())))?;
    let raw: RawConfig = serde_json::from_reader(file)
        .map_err(|e| CmaError::Parse(format!("Invalid config JSON '{}': {e}", path.display())))?;
    raw.into_model()
}

/// Parse and validate a configuration document.
pub fn parse_config(json: &str) -> Result<ModelConfig, CmaError> {
    let raw: RawConfig =
        serde_json::from_str(json).map_err(|e| CmaError::Parse(format!("Invalid config JSON: {e}")))?;
    raw.into_model()
}

fn pct(v: f64) -> f64 {
    v / 100.0
}

impl RawConfig {
    /// Convert percent inputs to decimals, resolve tags and validate.
    pub fn into_model(self) -> Result<ModelConfig, CmaError> {
        let mut regions = BTreeMap::new();
        for (tag, raw) in self.regions {
            let region = Region::parse_tag(&tag)?
                .ok_or_else(|| CmaError::config(format!("Region key '{tag}' is not a region.")))?;
            if regions.insert(region, raw.into_assumptions(region)?).is_some() {
                return Err(CmaError::config(format!(
                    "Region {} is configured twice.",
                    region.display_name()
                )));
            }
        }

        let assets = self
            .assets
            .into_iter()
            .map(RawAsset::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        let config = ModelConfig {
            as_of: self.as_of,
            lambda: self.lambda,
            window: self.window,
            tau: self.tau,
            convexity: self.convexity,
            local_inflation: self.local_inflation.map(pct),
            regions,
            assets,
        };
        config.validate()?;
        Ok(config)
    }
}

impl RawRegion {
    fn into_assumptions(self, region: Region) -> Result<RegionAssumptions, CmaError> {
        Ok(RegionAssumptions {
            inflation: pct(self.inflation),
            real_cash_rate: pct(self.real_cash_rate),
            yield_norm_years: horizon(self.yield_norm_years, region, "yield_norm_years")?,
            spread_norm_years: horizon(self.spread_norm_years, region, "spread_norm_years")?,
            term_premium_adjust: pct(self.term_premium_adjust),
            term_premiums: self.term_premiums.into_iter().map(|(k, v)| (k, pct(v))).collect(),
            short_anchor: self
                .short_anchor
                .map(|p| TermStructurePoint::new(p.duration, pct(p.yield_))),
        })
    }
}

fn horizon(years: i64, region: Region, field: &str) -> Result<usize, CmaError> {
    usize::try_from(years)
        .ok()
        .filter(|y| *y <= HORIZON_YEARS)
        .ok_or_else(|| {
            CmaError::config(format!(
                "{}.{field}={years} must be within 0..={HORIZON_YEARS}.",
                region.display_name()
            ))
        })
}

impl RawAsset {
    fn into_record(self) -> Result<AssetRecord, CmaError> {
        let field = |f: &str| format!("{}.{f}", self.name);

        let proxy = match &self.proxy {
            Cell::Text(t) => ProxyRef::parse(t),
            Cell::Number(_) => return Err(CmaError::config(format!("{}: proxy must be an asset name.", field("proxy")))),
        };
        let term_structure = match self.term_structure.text() {
            Some(tag) => Region::parse_tag(&tag)
                .map_err(|e| e.context(&self.name))?
                .into(),
            None => Modeled::NotApplicable,
        };
        let spread_target = match self.spread_target {
            None | Some(RawSpreadTarget::Historical) => SpreadTarget::Historical,
            Some(RawSpreadTarget::Fixed { value }) => SpreadTarget::Fixed { value: pct(value) },
            Some(RawSpreadTarget::InflationLinked) => SpreadTarget::InflationLinked,
            Some(RawSpreadTarget::TaxExempt { ratio }) => SpreadTarget::TaxExempt { ratio },
        };

        Ok(AssetRecord {
            proxy,
            beta_reference: self.beta_reference.text().into(),
            information_ratio: self.information_ratio.number(&field("information_ratio"), 1.0)?,
            term_structure,
            default_rate: self.default_rate.number(&field("default_rate"), 0.01)?,
            recovery_rate: self.recovery_rate.number(&field("recovery_rate"), 0.01)?,
            spread_target,
            name: self.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE: &str = r#"{
        "as_of": "2024-12-31",
        "lambda": 0.99,
        "local_inflation": 2.0,
        "regions": {
            "US": {
                "inflation": 2.5, "real_cash_rate": 0.5,
                "yield_norm_years": 5, "spread_norm_years": 3,
                "term_premiums": { "3M": 0.0, "10Y": 1.2 }
            },
            "EM": {
                "inflation": 4.0, "real_cash_rate": 1.0,
                "yield_norm_years": 3, "spread_norm_years": 3,
                "term_premium_adjust": 0.25,
                "short_anchor": { "duration": 0.25, "yield": 5.0 }
            }
        },
        "assets": [
            { "name": "U.S. Equity", "proxy": "Building Blocks" },
            { "name": "U.S. Small Cap", "proxy": "U.S. Equity", "beta_reference": "U.S. Equity",
              "information_ratio": 0.2 },
            { "name": "U.S. High Yield", "proxy": "N/A", "term_structure": "US",
              "default_rate": 3.5, "recovery_rate": 40 },
            { "name": "Municipals", "term_structure": "US", "default_rate": "N/A",
              "recovery_rate": "N/A", "spread_target": { "kind": "tax_exempt", "ratio": 0.75 } },
            { "name": "EM Debt", "term_structure": "EM",
              "spread_target": { "kind": "fixed", "value": 2.5 } }
        ]
    }"#;

    #[test]
    fn percent_inputs_become_decimals() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.window, DEFAULT_WINDOW);
        assert_eq!(config.tau, DEFAULT_TAU);
        assert_eq!(config.convexity, DEFAULT_CONVEXITY);
        assert_abs_diff_eq!(config.local_inflation.unwrap(), 0.02, epsilon = 1e-15);

        let us = config.region(Region::Domestic).unwrap();
        assert_abs_diff_eq!(us.normalized_short_rate(), 0.03, epsilon = 1e-15);
        assert_abs_diff_eq!(us.term_premiums["10Y"], 0.012, epsilon = 1e-15);

        let em = config.region(Region::Emerging).unwrap();
        assert_abs_diff_eq!(em.term_premium_adjust, 0.0025, epsilon = 1e-15);
        assert_abs_diff_eq!(em.short_anchor.unwrap().yield_, 0.05, epsilon = 1e-15);

        let hy = config.asset("U.S. High Yield").unwrap();
        assert_abs_diff_eq!(hy.default_drag(), 0.035 * 0.6, epsilon = 1e-15);
        assert_eq!(hy.term_structure, Modeled::Value(Region::Domestic));

        let em_debt = config.asset("EM Debt").unwrap();
        assert_eq!(em_debt.spread_target, SpreadTarget::Fixed { value: 0.025 });
    }

    #[test]
    fn not_applicable_cells_are_tagged_not_zero() {
        let config = parse_config(SAMPLE).unwrap();
        let muni = config.asset("Municipals").unwrap();
        assert_eq!(muni.default_rate, Modeled::NotApplicable);
        assert_eq!(muni.spread_target, SpreadTarget::TaxExempt { ratio: 0.75 });

        let equity = config.asset("U.S. Equity").unwrap();
        assert_eq!(equity.proxy, ProxyRef::Exempt);
        assert_eq!(equity.beta_reference, Modeled::NotApplicable);
        assert_eq!(equity.term_structure, Modeled::NotApplicable);

        let small = config.asset("U.S. Small Cap").unwrap();
        assert_eq!(small.proxy, ProxyRef::Proxy("U.S. Equity".to_string()));
        assert_eq!(small.information_ratio, Modeled::Value(0.2));
    }

    #[test]
    fn out_of_range_values_are_configuration_errors() {
        let bad_lambda = SAMPLE.replace("\"lambda\": 0.99", "\"lambda\": 1.0");
        assert!(matches!(parse_config(&bad_lambda), Err(CmaError::ConfigurationInvalid(_))));

        let bad_horizon = SAMPLE.replace("\"yield_norm_years\": 5", "\"yield_norm_years\": 12");
        assert!(matches!(parse_config(&bad_horizon), Err(CmaError::ConfigurationInvalid(_))));

        let negative_horizon = SAMPLE.replace("\"yield_norm_years\": 5", "\"yield_norm_years\": -1");
        assert!(matches!(parse_config(&negative_horizon), Err(CmaError::ConfigurationInvalid(_))));

        let bad_proxy = SAMPLE.replace("\"proxy\": \"U.S. Equity\"", "\"proxy\": \"Nowhere\"");
        assert!(matches!(parse_config(&bad_proxy), Err(CmaError::ConfigurationInvalid(_))));

        let bad_cell = SAMPLE.replace("\"default_rate\": 3.5", "\"default_rate\": \"lots\"");
        assert!(matches!(parse_config(&bad_cell), Err(CmaError::ConfigurationInvalid(_))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_config("{ not json"), Err(CmaError::Parse(_))));
    }
}
