//! Proxy regression backfill.
//!
//! For every asset with missing periods and a proxy:
//!
//! - fit `asset = slope · proxy + intercept` by OLS over periods where both are observed
//! - fill each missing period where the proxy is observed
//! - leave periods where the proxy is also missing untouched
//!
//! All fits and fill values read the panel as it was before this call, so the
//! result does not depend on the order assets are processed in.

use log::{debug, warn};

use crate::domain::{AssetFailure, AssetId, ProxyAssignment, ReturnPanel};
use crate::error::CmaError;
use crate::math::fit_line;

/// One asset's fitted backfill line.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillFit {
    pub asset: AssetId,
    pub proxy: AssetId,
    pub slope: f64,
    pub intercept: f64,
    /// Periods where both asset and proxy were observed.
    pub overlap: usize,
    pub filled: usize,
    /// Missing periods left open because the proxy was missing too.
    pub unfilled: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillReport {
    pub fits: Vec<BackfillFit>,
    pub failures: Vec<AssetFailure>,
}

impl BackfillReport {
    pub fn filled_total(&self) -> usize {
        self.fits.iter().map(|f| f.filled).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fill gaps in `panel` in place from each asset's proxy.
///
/// Structural problems (a proxy that is not in the panel, a proxy cycle) abort
/// with `ConfigurationInvalid`. Too little overlap is recorded per asset in the
/// report and the asset is left as is.
pub fn backfill(panel: &mut ReturnPanel, proxies: &ProxyAssignment) -> Result<BackfillReport, CmaError> {
    proxies.check_acyclic()?;

    let snapshot = panel.clone();
    let mut report = BackfillReport::default();

    for asset in snapshot.assets() {
        let Some(proxy) = proxies.get(asset).proxy() else {
            continue;
        };
        let Some(target) = snapshot.column(asset) else {
            continue;
        };
        if target.iter().all(Option::is_some) {
            continue;
        }
        let source = snapshot.column(proxy).ok_or_else(|| {
            CmaError::config(format!(
                "Proxy '{proxy}' for '{asset}' has no return history."
            ))
        })?;

        let (xs, ys): (Vec<f64>, Vec<f64>) = source
            .iter()
            .zip(target)
            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
            .unzip();

        let Some(line) = fit_line(&xs, &ys) else {
            let error = if xs.len() < 2 {
                CmaError::data(format!(
                    "'{asset}' has {} overlapping periods with proxy '{proxy}'; need at least 2.",
                    xs.len()
                ))
            } else {
                CmaError::degenerate(format!(
                    "Proxy '{proxy}' is constant over its overlap with '{asset}'."
                ))
            };
            warn!("Backfill skipped: {error}");
            report.failures.push(AssetFailure {
                asset: asset.clone(),
                error,
            });
            continue;
        };

        let mut filled = 0;
        let mut unfilled = 0;
        if let Some(column) = panel.column_mut(asset) {
            for (slot, proxy_value) in column.iter_mut().zip(source) {
                if slot.is_some() {
                    continue;
                }
                match proxy_value {
                    Some(x) => {
                        *slot = Some(line.predict(*x));
                        filled += 1;
                    }
                    None => unfilled += 1,
                }
            }
        }

        debug!(
            "Backfill '{asset}' from '{proxy}': slope={:.4} intercept={:.6} overlap={} filled={filled}",
            line.slope, line.intercept, line.n
        );
        if unfilled > 0 {
            warn!("'{asset}' still has {unfilled} missing periods where '{proxy}' is also missing.");
        }

        report.fits.push(BackfillFit {
            asset: asset.clone(),
            proxy: proxy.to_string(),
            slope: line.slope,
            intercept: line.intercept,
            overlap: line.n,
            filled,
            unfilled,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProxyRef;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn dates(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2010 + (i / 12) as i32, (i % 12) as u32 + 1, 1).unwrap())
            .collect()
    }

    fn proxies(pairs: &[(&str, &str)]) -> ProxyAssignment {
        pairs
            .iter()
            .map(|(a, p)| (a.to_string(), ProxyRef::Proxy(p.to_string())))
            .collect()
    }

    #[test]
    fn fills_missing_history_from_fitted_line() {
        let market = vec![0.01, -0.02, 0.03, 0.005, -0.01, 0.02];
        let asset: Vec<Option<f64>> = market
            .iter()
            .enumerate()
            .map(|(i, m)| (i >= 2).then_some(0.001 + 1.5 * m))
            .collect();
        let mut panel = ReturnPanel::new(
            dates(6),
            vec![
                ("Market".into(), market.iter().copied().map(Some).collect()),
                ("Small Cap".into(), asset),
            ],
        )
        .unwrap();

        let report = backfill(&mut panel, &proxies(&[("Small Cap", "Market")])).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.fits.len(), 1);
        let fit = &report.fits[0];
        assert_abs_diff_eq!(fit.slope, 1.5, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.intercept, 0.001, epsilon = 1e-12);
        assert_eq!((fit.overlap, fit.filled, fit.unfilled), (4, 2, 0));

        let column = panel.column("Small Cap").unwrap();
        assert_abs_diff_eq!(column[0].unwrap(), 0.001 + 1.5 * 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(column[1].unwrap(), 0.001 - 1.5 * 0.02, epsilon = 1e-12);
        assert!(panel.is_complete());
    }

    #[test]
    fn observed_periods_are_never_overwritten() {
        let mut panel = ReturnPanel::new(
            dates(4),
            vec![
                ("P".into(), vec![Some(0.01), Some(0.02), Some(0.03), Some(0.04)]),
                ("A".into(), vec![None, Some(0.5), Some(-0.2), Some(0.7)]),
            ],
        )
        .unwrap();
        backfill(&mut panel, &proxies(&[("A", "P")])).unwrap();
        assert_eq!(&panel.column("A").unwrap()[1..], &[Some(0.5), Some(-0.2), Some(0.7)]);
        assert!(panel.column("A").unwrap()[0].is_some());
    }

    #[test]
    fn single_overlap_is_flagged_and_left_unfilled() {
        let mut panel = ReturnPanel::new(
            dates(3),
            vec![
                ("P".into(), vec![Some(0.01), Some(0.02), Some(0.03)]),
                ("A".into(), vec![None, None, Some(0.04)]),
            ],
        )
        .unwrap();

        let report = backfill(&mut panel, &proxies(&[("A", "P")])).unwrap();

        assert!(report.fits.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].asset, "A");
        assert!(matches!(report.failures[0].error, CmaError::DataInsufficient(_)));
        assert_eq!(panel.missing_count("A"), 2);
    }

    #[test]
    fn periods_missing_on_the_proxy_stay_missing() {
        let mut panel = ReturnPanel::new(
            dates(5),
            vec![
                ("P".into(), vec![None, Some(0.02), Some(0.01), Some(0.03), Some(-0.01)]),
                ("A".into(), vec![None, None, Some(0.02), Some(0.06), Some(-0.02)]),
            ],
        )
        .unwrap();

        let report = backfill(&mut panel, &proxies(&[("A", "P")])).unwrap();

        assert_eq!(report.fits[0].filled, 1);
        assert_eq!(report.fits[0].unfilled, 1);
        let column = panel.column("A").unwrap();
        assert!(column[0].is_none());
        assert!(column[1].is_some());
    }

    #[test]
    fn second_run_on_complete_panel_is_a_no_op() {
        let mut panel = ReturnPanel::new(
            dates(5),
            vec![
                ("P".into(), vec![Some(0.01), Some(0.02), Some(-0.01), Some(0.03), Some(0.0)]),
                ("A".into(), vec![None, None, Some(-0.015), Some(0.05), Some(0.001)]),
            ],
        )
        .unwrap();
        let assignment = proxies(&[("A", "P")]);

        backfill(&mut panel, &assignment).unwrap();
        let after_first = panel.clone();
        let second = backfill(&mut panel, &assignment).unwrap();

        assert_eq!(panel, after_first);
        assert!(second.fits.is_empty());
        assert!(second.failures.is_empty());
    }

    #[test]
    fn results_do_not_depend_on_chain_order() {
        // B proxies C, A proxies B; A's fill uses B's pre-fill values.
        let mut panel = ReturnPanel::new(
            dates(5),
            vec![
                ("A".into(), vec![None, None, Some(0.02), Some(0.04), Some(0.01)]),
                ("B".into(), vec![None, Some(0.02), Some(0.01), Some(0.02), Some(0.005)]),
                ("C".into(), vec![Some(0.01), Some(0.01), Some(0.005), Some(0.01), Some(0.0025)]),
            ],
        )
        .unwrap();

        let report = backfill(&mut panel, &proxies(&[("A", "B"), ("B", "C")])).unwrap();

        let a = report.fits.iter().find(|f| f.asset == "A").unwrap();
        assert_eq!((a.filled, a.unfilled), (1, 1));
        assert!(panel.column("A").unwrap()[0].is_none());
        assert!(panel.column("B").unwrap()[0].is_some());
    }

    #[test]
    fn unknown_proxy_is_configuration_invalid() {
        let mut panel = ReturnPanel::new(dates(2), vec![("A".into(), vec![None, Some(0.01)])]).unwrap();
        assert!(matches!(
            backfill(&mut panel, &proxies(&[("A", "Ghost")])),
            Err(CmaError::ConfigurationInvalid(_))
        ));
    }
}
