//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the engines stay free of presentation concerns
//! - output changes are localized (important for future snapshot tests)
//!
//! Every function returns a `String`; the caller decides where it goes.

use std::collections::BTreeMap;

use crate::backfill::BackfillReport;
use crate::domain::{AssetFailure, AssetId, AssetSummary, BondReturnProjection, Modeled, ModelConfig, Region};
use crate::error::CmaError;
use crate::projection::{RegionCurves, nearest_index};
use crate::risk::RiskEstimate;

/// Durations shown in the curve tables.
const CURVE_POINTS: [f64; 4] = [2.0, 5.0, 10.0, 30.0];

/// Header with the run's scalar assumptions.
pub fn format_run_header(config: &ModelConfig) -> String {
    let mut out = String::new();
    out.push_str("=== cma - Capital Market Assumptions ===\n");
    out.push_str(&format!("As-of: {}\n", config.as_of));
    out.push_str(&format!(
        "Risk: lambda={} window={} | Curves: tau={} convexity={}\n",
        config.lambda, config.window, config.tau, config.convexity
    ));
    for (region, a) in &config.regions {
        out.push_str(&format!(
            "- {:<20} inflation={} real cash={} yield horizon={}y spread horizon={}y\n",
            region.display_name(),
            pct(a.inflation),
            pct(a.real_cash_rate),
            a.yield_norm_years,
            a.spread_norm_years
        ));
    }
    out
}

/// Backfill fits and the assets that could not be filled.
pub fn format_backfill(report: &BackfillReport) -> String {
    let mut out = String::new();
    out.push_str("Backfill:\n");
    if report.fits.is_empty() && report.failures.is_empty() {
        out.push_str("  (nothing to fill)\n");
        return out;
    }
    push_row(
        &mut out,
        format!(
            "{:<24} {:<24} {:>8} {:>10} {:>7} {:>6} {:>8}",
            "asset", "proxy", "slope", "intercept", "overlap", "filled", "unfilled"
        ),
    );
    push_rule(&mut out, &[24, 24, 8, 10, 7, 6, 8]);
    for f in &report.fits {
        push_row(
            &mut out,
            format!(
                "{:<24} {:<24} {:>8.4} {:>10.6} {:>7} {:>6} {:>8}",
                truncate(&f.asset, 24),
                truncate(&f.proxy, 24),
                f.slope,
                f.intercept,
                f.overlap,
                f.filled,
                f.unfilled
            ),
        );
    }
    for f in &report.failures {
        out.push_str(&format!("  ! {}: {}\n", f.asset, f.error));
    }
    out
}

/// Volatility and beta per asset.
pub fn format_risk(estimate: &RiskEstimate, betas: &[(AssetId, Result<Modeled<f64>, CmaError>)]) -> String {
    let beta_of: BTreeMap<&str, &Result<Modeled<f64>, CmaError>> =
        betas.iter().map(|(a, b)| (a.as_str(), b)).collect();

    let mut out = String::new();
    out.push_str("Risk (exponentially weighted):\n");
    push_row(
        &mut out,
        format!("{:<24} {:>10} {:>10} {:>8} {:<4}", "asset", "monthly σ", "annual σ", "beta", ""),
    );
    push_rule(&mut out, &[24, 10, 10, 8]);
    for (i, asset) in estimate.assets().iter().enumerate() {
        let beta = match beta_of.get(asset.as_str()) {
            Some(Ok(Modeled::Value(b))) => format!("{b:>8.3}"),
            Some(Err(_)) => format!("{:>8}", "err"),
            _ => format!("{:>8}", "-"),
        };
        let flag = if estimate.degenerate.contains(asset) { "flat" } else { "" };
        push_row(
            &mut out,
            format!(
                "{:<24} {:>10} {:>10} {beta} {flag}",
                truncate(asset, 24),
                pct(estimate.monthly_sigma[i]),
                pct(estimate.annual_sigma[i]),
            ),
        );
    }
    out
}

/// Lower triangle of the correlation matrix.
pub fn format_correlation(estimate: &RiskEstimate) -> String {
    let n = estimate.assets().len();
    let mut out = String::new();
    out.push_str("Correlation:\n");
    for i in 0..n {
        let mut line = format!("{:<24}", truncate(&estimate.assets()[i], 24));
        for j in 0..=i {
            line.push_str(&format!(" {:>6.2}", estimate.correlation[(i, j)]));
        }
        push_row(&mut out, line);
    }
    out
}

/// Yearly curve parameters and representative yields for each region.
pub fn format_curves(curves: &BTreeMap<Region, Result<RegionCurves, CmaError>>) -> String {
    let mut out = String::new();
    for (region, result) in curves {
        out.push_str(&format!("Curves: {}\n", region.display_name()));
        let c = match result {
            Ok(c) => c,
            Err(e) => {
                out.push_str(&format!("  ! {e}\n"));
                continue;
            }
        };

        let mut header = format!("{:>4} {:>9} {:>9} {:>9} {:>9}", "year", "beta0", "beta1", "beta2", "max err");
        for d in CURVE_POINTS {
            header.push_str(&format!(" {:>7}", format!("{d}y")));
        }
        push_row(&mut out, header);
        push_rule(&mut out, &[4, 9, 9, 9, 9, 7, 7, 7, 7]);

        let columns: Vec<usize> = CURVE_POINTS.iter().map(|d| nearest_index(&c.grid, *d)).collect();
        for (year, p) in c.params.iter().enumerate() {
            let mut line = format!(
                "{year:>4} {:>9.5} {:>9.5} {:>9.5} {:>9.1e}",
                p.beta0, p.beta1, p.beta2, c.fit_errors[year]
            );
            for k in &columns {
                line.push_str(&format!(" {:>7}", pct(c.curves[year][*k])));
            }
            push_row(&mut out, line);
        }
        out.push('\n');
    }
    out
}

/// Bond projections: today vs year 10, then the annualized outcome.
pub fn format_bonds(projections: &[BondReturnProjection]) -> String {
    let mut out = String::new();
    out.push_str("Bond projections:\n");
    push_row(
        &mut out,
        format!(
            "{:<20} {:<18} {:>5} {:>7} {:>7} {:>7} {:>7} {:>7} {:>8} {:>8} {:>8}",
            "asset", "region", "dur", "y0", "y10", "s0", "s10", "drag", "return", "income", "adj"
        ),
    );
    push_rule(&mut out, &[20, 18, 5, 7, 7, 7, 7, 7, 8, 8, 8]);
    for p in projections {
        push_row(
            &mut out,
            format!(
                "{:<20} {:<18} {:>5.1} {:>7} {:>7} {:>7} {:>7} {:>7} {:>8} {:>8} {:>8}",
                truncate(&p.asset, 20),
                p.region.display_name(),
                p.durations[0],
                pct(p.yields[0]),
                pct(p.yields[10]),
                pct(p.spreads[0]),
                pct(p.spreads[10]),
                pct(p.default_drag),
                pct(p.expected_return),
                pct(p.average_income),
                p.inflation_adjusted_return.map(pct).unwrap_or_else(|| "-".to_string()),
            ),
        );
    }
    out
}

/// Final per-asset table.
pub fn format_summary(rows: &[AssetSummary]) -> String {
    let mut out = String::new();
    out.push_str("Summary:\n");
    push_row(
        &mut out,
        format!(
            "{:<24} {:>8} {:>7} {:>8} {:>8} {:>8}",
            "asset", "vol", "beta", "return", "income", "adj"
        ),
    );
    push_rule(&mut out, &[24, 8, 7, 8, 8, 8]);
    let dash = || "-".to_string();
    for r in rows {
        push_row(
            &mut out,
            format!(
                "{:<24} {:>8} {:>7} {:>8} {:>8} {:>8}",
                truncate(&r.asset, 24),
                r.annual_volatility.map(pct).unwrap_or_else(dash),
                r.beta.map(|b| format!("{b:.3}")).unwrap_or_else(dash),
                r.expected_return.map(pct).unwrap_or_else(dash),
                r.average_income.map(pct).unwrap_or_else(dash),
                r.inflation_adjusted_return.map(pct).unwrap_or_else(dash),
            ),
        );
    }
    out
}

/// Partial failures, or nothing when the run was clean.
pub fn format_failures(failures: &[AssetFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = format!("Partial failures ({}):\n", failures.len());
    for f in failures {
        out.push_str(&format!("- {}: {}\n", f.asset, f.error));
    }
    out
}

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn push_row(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn push_rule(out: &mut String, widths: &[usize]) {
    let parts: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(out, parts.join(" "));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CurveParameters;
    use crate::domain::PATH_LEN;

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("Short", 10), "Short");
        assert_eq!(truncate("A very long asset name", 8), "A very .");
    }

    #[test]
    fn summary_uses_dashes_for_missing_values() {
        let rows = vec![AssetSummary {
            asset: "U.S. Equity".to_string(),
            annual_volatility: Some(0.1567),
            beta: None,
            beta_reference: None,
            region: None,
            expected_return: None,
            average_income: None,
            inflation_adjusted_return: None,
        }];
        let text = format_summary(&rows);
        let line = text.lines().nth(3).unwrap();
        assert!(line.starts_with("U.S. Equity"));
        assert!(line.contains("15.67%"));
        assert_eq!(line.matches(" -").count(), 4);
    }

    #[test]
    fn failed_regions_are_listed_inline() {
        let flat = CurveParameters {
            beta0: 0.04,
            beta1: 0.0,
            beta2: 0.0,
            tau: 1.65,
        };
        let curves: BTreeMap<Region, Result<RegionCurves, CmaError>> = [
            (Region::Domestic, Ok(RegionCurves::from_parameters(Region::Domestic, [flat; PATH_LEN]))),
            (Region::Emerging, Err(CmaError::data("no anchors"))),
        ]
        .into_iter()
        .collect();

        let text = format_curves(&curves);
        assert!(text.contains("Curves: Domestic"));
        assert!(text.contains("4.00%"));
        assert!(text.contains("! Insufficient data: no anchors"));
    }

    #[test]
    fn clean_run_prints_no_failure_block() {
        assert!(format_failures(&[]).is_empty());
    }
}
