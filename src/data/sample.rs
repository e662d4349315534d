//! Synthetic market generation for `cma demo` and end-to-end tests.
//!
//! Returns come from a small factor model (domestic equity, international
//! equity, treasuries) so proxies are genuinely correlated with the assets they
//! backfill. Proxied assets start late, which leaves gaps for the backfill to
//! fill. Treasury anchors are jittered around a fixed knot curve per region.

use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::app::pipeline::MarketData;
use crate::domain::{
    AssetId, AssetRecord, BondSnapshot, Modeled, ModelConfig, ProxyRef, Region, RegionAssumptions, ReturnPanel,
    SpreadTarget, TermAnchor, TermStructurePoint,
};
use crate::error::CmaError;
use crate::io::config::{DEFAULT_CONVEXITY, DEFAULT_TAU};
use crate::projection::{SpreadHistory, TermStructureSnapshot};
use crate::risk::DEFAULT_WINDOW;

/// A configuration and the market data it is meant to run against.
#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    pub config: ModelConfig,
    pub market: MarketData,
}

/// Static description of one synthetic asset.
struct AssetSpec {
    name: &'static str,
    proxy: Option<&'static str>,
    /// Months of history missing at the start.
    late_start: usize,
    beta_reference: Option<&'static str>,
    region: Option<Region>,
    /// `(default, recovery)` as decimals.
    credit: Option<(f64, f64)>,
    spread_target: SpreadTarget,
    /// `(spread, duration)` today.
    bond: Option<(f64, f64)>,
}

const ASSETS: [AssetSpec; 10] = [
    AssetSpec {
        name: "U.S. Equity",
        proxy: None,
        late_start: 0,
        beta_reference: None,
        region: None,
        credit: None,
        spread_target: SpreadTarget::Historical,
        bond: None,
    },
    AssetSpec {
        name: "Intl Equity",
        proxy: None,
        late_start: 0,
        beta_reference: Some("U.S. Equity"),
        region: None,
        credit: None,
        spread_target: SpreadTarget::Historical,
        bond: None,
    },
    AssetSpec {
        name: "U.S. Small Cap",
        proxy: Some("U.S. Equity"),
        late_start: 60,
        beta_reference: Some("U.S. Equity"),
        region: None,
        credit: None,
        spread_target: SpreadTarget::Historical,
        bond: None,
    },
    AssetSpec {
        name: "EM Equity",
        proxy: Some("Intl Equity"),
        late_start: 96,
        beta_reference: Some("Intl Equity"),
        region: None,
        credit: None,
        spread_target: SpreadTarget::Historical,
        bond: None,
    },
    AssetSpec {
        name: "U.S. Treasury",
        proxy: None,
        late_start: 0,
        beta_reference: None,
        region: Some(Region::Domestic),
        credit: None,
        spread_target: SpreadTarget::Fixed { value: 0.0 },
        bond: Some((0.0, 6.0)),
    },
    AssetSpec {
        name: "U.S. High Yield",
        proxy: Some("U.S. Equity"),
        late_start: 36,
        beta_reference: Some("U.S. Equity"),
        region: Some(Region::Domestic),
        credit: Some((0.035, 0.40)),
        spread_target: SpreadTarget::Historical,
        bond: Some((0.032, 3.5)),
    },
    AssetSpec {
        name: "U.S. TIPS",
        proxy: Some("U.S. Treasury"),
        late_start: 48,
        beta_reference: Some("U.S. Treasury"),
        region: Some(Region::Domestic),
        credit: None,
        spread_target: SpreadTarget::InflationLinked,
        bond: Some((-0.022, 6.5)),
    },
    AssetSpec {
        name: "Municipals",
        proxy: Some("U.S. Treasury"),
        late_start: 24,
        beta_reference: Some("U.S. Treasury"),
        region: Some(Region::Domestic),
        credit: None,
        spread_target: SpreadTarget::TaxExempt { ratio: 0.75 },
        bond: Some((-0.008, 5.0)),
    },
    AssetSpec {
        name: "Global Bonds",
        proxy: Some("U.S. Treasury"),
        late_start: 12,
        beta_reference: Some("U.S. Treasury"),
        region: Some(Region::GlobalExDomestic),
        credit: None,
        spread_target: SpreadTarget::Fixed { value: 0.003 },
        bond: Some((0.004, 7.0)),
    },
    AssetSpec {
        name: "EM Debt",
        proxy: Some("Intl Equity"),
        late_start: 72,
        beta_reference: Some("Intl Equity"),
        region: Some(Region::Emerging),
        credit: Some((0.015, 0.50)),
        spread_target: SpreadTarget::Historical,
        bond: Some((0.021, 6.8)),
    },
];

/// Treasury knot curves `(label, duration, yield)` per region.
fn knot_curve(region: Region) -> &'static [(&'static str, f64, f64)] {
    match region {
        Region::Domestic => &[
            ("3M", 0.25, 0.043),
            ("2Y", 1.9, 0.041),
            ("5Y", 4.6, 0.040),
            ("10Y", 8.5, 0.042),
            ("30Y", 17.5, 0.045),
        ],
        Region::Global => &[("2Y", 1.9, 0.030), ("5Y", 4.6, 0.031), ("10Y", 8.4, 0.033)],
        Region::GlobalExDomestic => &[("2Y", 1.9, 0.024), ("5Y", 4.6, 0.026), ("10Y", 8.3, 0.029)],
        Region::Emerging => &[("2Y", 1.8, 0.058), ("5Y", 4.2, 0.061), ("10Y", 7.4, 0.065)],
    }
}

fn region_assumptions(region: Region) -> RegionAssumptions {
    let (inflation, real_cash_rate, adjust, short) = match region {
        Region::Domestic => (0.025, 0.005, 0.0, None),
        Region::Global => (0.022, 0.003, 0.001, Some(0.030)),
        Region::GlobalExDomestic => (0.020, 0.002, 0.002, Some(0.025)),
        Region::Emerging => (0.040, 0.015, -0.002, Some(0.060)),
    };
    let term_premiums = if region == Region::Domestic {
        [("3M", 0.0), ("2Y", 0.003), ("5Y", 0.007), ("10Y", 0.012), ("30Y", 0.016)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    } else {
        BTreeMap::new()
    };
    RegionAssumptions {
        inflation,
        real_cash_rate,
        yield_norm_years: 5,
        spread_norm_years: 3,
        term_premium_adjust: adjust,
        term_premiums,
        short_anchor: short.map(|y| TermStructurePoint::new(0.25, y)),
    }
}

fn linear_interp(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    let (x0, y0) = a;
    let (x1, y1) = b;
    if (x1 - x0).abs() < 1e-12 {
        return y0;
    }
    let u = (x - x0) / (x1 - x0);
    y0 + u * (y1 - y0)
}

/// Knot curve yield at `duration`, flat beyond the end knots.
fn knot_yield(region: Region, duration: f64) -> f64 {
    let knots: Vec<(f64, f64)> = knot_curve(region).iter().map(|(_, d, y)| (*d, *y)).collect();
    let first = knots[0];
    let last = knots[knots.len() - 1];
    if duration <= first.0 {
        return first.1;
    }
    if duration >= last.0 {
        return last.1;
    }
    knots
        .windows(2)
        .find(|w| duration >= w[0].0 && duration <= w[1].0)
        .map(|w| linear_interp(w[0], w[1], duration))
        .unwrap_or(last.1)
}

fn normal(mean: f64, sd: f64) -> Result<Normal<f64>, CmaError> {
    Normal::new(mean, sd).map_err(|e| CmaError::degenerate(format!("Noise distribution error: {e}")))
}

/// Generate a reproducible market of `months` monthly observations.
pub fn generate_market(seed: u64, months: usize) -> Result<SyntheticMarket, CmaError> {
    if months < DEFAULT_WINDOW {
        return Err(CmaError::config(format!(
            "Synthetic history needs at least {DEFAULT_WINDOW} months, got {months}."
        )));
    }
    let as_of = NaiveDate::from_ymd_opt(2024, 12, 1)
        .ok_or_else(|| CmaError::config("Invalid synthetic as-of date."))?;
    let dates = (0..months)
        .map(|i| {
            as_of
                .checked_sub_months(Months::new((months - 1 - i) as u32))
                .ok_or_else(|| CmaError::config("Synthetic history reaches before the calendar."))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let equity = normal(0.007, 0.045)?;
    let rates = normal(0.003, 0.015)?;
    let idio = normal(0.0, 1.0)?;

    let mut series: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for _ in 0..months {
        let us = equity.sample(&mut rng);
        let intl = 0.8 * us + 0.002 + 0.030 * idio.sample(&mut rng);
        let tsy = rates.sample(&mut rng) - 0.05 * us;
        let draws = [
            ("U.S. Equity", us),
            ("Intl Equity", intl),
            ("U.S. Small Cap", 1.2 * us + 0.001 + 0.020 * idio.sample(&mut rng)),
            ("EM Equity", 1.1 * intl + 0.001 + 0.035 * idio.sample(&mut rng)),
            ("U.S. Treasury", tsy),
            ("U.S. High Yield", 0.35 * us + 0.004 + 0.015 * idio.sample(&mut rng)),
            ("U.S. TIPS", 0.8 * tsy + 0.0005 + 0.006 * idio.sample(&mut rng)),
            ("Municipals", 0.6 * tsy + 0.001 + 0.005 * idio.sample(&mut rng)),
            ("Global Bonds", 0.7 * tsy + 0.0005 + 0.010 * idio.sample(&mut rng)),
            ("EM Debt", 0.3 * intl + 0.004 + 0.020 * idio.sample(&mut rng)),
        ];
        for (name, r) in draws {
            series.entry(name).or_default().push(r);
        }
    }

    let columns: Vec<(AssetId, Vec<Option<f64>>)> = ASSETS
        .iter()
        .map(|spec| {
            let values = series.remove(spec.name).unwrap_or_default();
            let column = values
                .into_iter()
                .enumerate()
                .map(|(i, r)| (i >= spec.late_start).then_some(r))
                .collect();
            (spec.name.to_string(), column)
        })
        .collect();
    let returns = ReturnPanel::new(dates, columns)?;

    let mut spreads = SpreadHistory::new();
    for (name, center, sd) in [("U.S. High Yield", 0.045, 0.015), ("EM Debt", 0.030, 0.008)] {
        let dist = normal(center, sd)?;
        spreads.insert(
            name.to_string(),
            (0..months).map(|_| dist.sample(&mut rng).max(0.002)).collect(),
        );
    }

    let jitter = normal(0.0, 0.0005)?;
    let term_structure: TermStructureSnapshot = Region::ALL
        .iter()
        .map(|&region| {
            let anchors = knot_curve(region)
                .iter()
                .map(|(label, d, y)| TermAnchor {
                    label: label.to_string(),
                    point: TermStructurePoint::new(*d, y + jitter.sample(&mut rng)),
                })
                .collect();
            (region, anchors)
        })
        .collect();

    let bonds = ASSETS
        .iter()
        .filter_map(|spec| Some((spec, spec.region?, spec.bond?)))
        .map(|(spec, region, (spread, duration))| {
            let snapshot = BondSnapshot {
                yield_: knot_yield(region, duration) + spread,
                spread,
                duration,
            };
            (spec.name.to_string(), snapshot)
        })
        .collect();

    let assets = ASSETS
        .iter()
        .map(|spec| AssetRecord {
            name: spec.name.to_string(),
            proxy: spec.proxy.map_or(ProxyRef::Exempt, |p| ProxyRef::Proxy(p.to_string())),
            beta_reference: spec.beta_reference.map(str::to_string).into(),
            information_ratio: Modeled::NotApplicable,
            term_structure: spec.region.into(),
            default_rate: spec.credit.map(|(d, _)| d).into(),
            recovery_rate: spec.credit.map(|(_, r)| r).into(),
            spread_target: spec.spread_target.clone(),
        })
        .collect();

    let config = ModelConfig {
        as_of,
        lambda: 0.99,
        window: DEFAULT_WINDOW,
        tau: DEFAULT_TAU,
        convexity: DEFAULT_CONVEXITY,
        local_inflation: Some(0.025),
        regions: Region::ALL.iter().map(|&r| (r, region_assumptions(r))).collect(),
        assets,
    };
    config.validate()?;

    Ok(SyntheticMarket {
        config,
        market: MarketData {
            returns,
            spreads,
            bonds,
            term_structure,
        },
    })
}
