//! Exponentially weighted volatility, correlation and covariance.
//!
//! For asset `i` over the trailing window with weights `w_t`:
//!
//! ```text
//! r̄_i      = arithmetic mean of r_i over the window
//! σ_i^m    = sqrt( Σ w_t (r_it - r̄_i)^2 )                   monthly
//! m_i      = Σ w_t r_it                                      weighted mean
//! σ_i      = sqrt( ((1+m_i)^2 + (σ_i^m)^2)^12 - (1+m_i)^24 ) annual
//! z_it     = (r_it - r̄_i) / σ_i^m
//! ρ_ij     = Σ w_t z_it z_jt
//! Cov_ij   = ρ_ij σ_i σ_j
//! ```
//!
//! The annualization compounds the monthly first and second moments over twelve
//! months instead of scaling by `sqrt(12)`.

use std::collections::HashMap;

use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{AssetId, AssetRecord, Modeled, ReturnPanel};
use crate::error::CmaError;
use crate::risk::DecayWeights;

/// Monthly σ below this is treated as zero variance.
const ZERO_VARIANCE: f64 = 1e-12;

/// Negative radicands smaller than this in magnitude are rounding noise.
const RADICAND_TOLERANCE: f64 = 1e-12;

/// Risk estimates for every asset of a panel.
#[derive(Debug, Clone)]
pub struct RiskEstimate {
    assets: Vec<AssetId>,
    index: HashMap<AssetId, usize>,
    pub monthly_sigma: Vec<f64>,
    pub weighted_mean: Vec<f64>,
    pub annual_sigma: Vec<f64>,
    pub correlation: DMatrix<f64>,
    pub covariance: DMatrix<f64>,
    /// Assets with zero variance over the window: σ = 0, correlations 0 off the diagonal.
    pub degenerate: Vec<AssetId>,
}

/// Estimate volatility and correlation for every asset in `panel`.
///
/// The panel must have at least `weights.len()` periods and no gaps in the
/// trailing window of any asset (run the backfill first).
pub fn estimate(panel: &ReturnPanel, weights: &DecayWeights) -> Result<RiskEstimate, CmaError> {
    let window = weights.len();
    let assets: Vec<AssetId> = panel.assets().to_vec();
    if assets.is_empty() {
        return Err(CmaError::data("Return panel has no assets."));
    }

    let mut z_rows = Vec::with_capacity(assets.len());
    let mut monthly_sigma = Vec::with_capacity(assets.len());
    let mut weighted_mean = Vec::with_capacity(assets.len());
    let mut annual_sigma = Vec::with_capacity(assets.len());
    let mut degenerate = Vec::new();

    for asset in &assets {
        let returns = panel.trailing(asset, window)?;
        let mean = returns.iter().sum::<f64>() / window as f64;
        let deviations: Vec<f64> = returns.iter().map(|r| r - mean).collect();

        let variance: f64 = weights
            .as_slice()
            .iter()
            .zip(&deviations)
            .map(|(w, d)| w * d * d)
            .sum();
        let sigma_m = variance.sqrt();
        let m = weights.dot(&returns);

        if sigma_m < ZERO_VARIANCE {
            degenerate.push(asset.clone());
            monthly_sigma.push(0.0);
            annual_sigma.push(annualize(0.0, m).map_err(|e| e.context(format!("'{asset}'")))?);
            z_rows.push(vec![0.0; window]);
        } else {
            monthly_sigma.push(sigma_m);
            annual_sigma.push(annualize(sigma_m, m).map_err(|e| e.context(format!("'{asset}'")))?);
            z_rows.push(deviations.iter().map(|d| d / sigma_m).collect());
        }
        weighted_mean.push(m);
    }

    let w = weights.as_slice();
    let n = assets.len();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        return 1.0;
                    }
                    let rho: f64 = w
                        .iter()
                        .zip(z_rows[i].iter().zip(&z_rows[j]))
                        .map(|(wt, (zi, zj))| wt * zi * zj)
                        .sum();
                    rho.clamp(-1.0, 1.0)
                })
                .collect()
        })
        .collect();

    let correlation = DMatrix::from_fn(n, n, |i, j| rows[i][j]);
    let covariance = covariance_from(&correlation, &annual_sigma);
    let index = assets.iter().enumerate().map(|(i, a)| (a.clone(), i)).collect();

    debug!(
        "Risk estimate: {n} assets, window={window}, lambda={}, degenerate={}",
        weights.lambda(),
        degenerate.len()
    );

    Ok(RiskEstimate {
        assets,
        index,
        monthly_sigma,
        weighted_mean,
        annual_sigma,
        correlation,
        covariance,
        degenerate,
    })
}

/// Annualize a monthly σ with the compounding correction.
pub fn annualize(monthly_sigma: f64, weighted_mean: f64) -> Result<f64, CmaError> {
    let growth_sq = (1.0 + weighted_mean).powi(2);
    let base = growth_sq + monthly_sigma * monthly_sigma;
    let radicand = base.powi(12) - growth_sq.powi(12);
    if !radicand.is_finite() {
        return Err(CmaError::degenerate("Annualized variance is not finite."));
    }
    if radicand < 0.0 {
        if radicand > -RADICAND_TOLERANCE {
            return Ok(0.0);
        }
        return Err(CmaError::degenerate(format!(
            "Annualized variance is negative ({radicand})."
        )));
    }
    Ok(radicand.sqrt())
}

/// `Cov = Corr ⊙ (σ σ^T)`.
pub fn covariance_from(correlation: &DMatrix<f64>, sigma: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(correlation.nrows(), correlation.ncols(), |i, j| {
        correlation[(i, j)] * sigma[i] * sigma[j]
    })
}

impl RiskEstimate {
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    fn position(&self, asset: &str) -> Result<usize, CmaError> {
        self.index
            .get(asset)
            .copied()
            .ok_or_else(|| CmaError::data(format!("Asset '{asset}' has no risk estimate.")))
    }

    pub fn annual_sigma_of(&self, asset: &str) -> Option<f64> {
        self.index.get(asset).map(|&i| self.annual_sigma[i])
    }

    pub fn correlation_between(&self, a: &str, b: &str) -> Result<f64, CmaError> {
        Ok(self.correlation[(self.position(a)?, self.position(b)?)])
    }

    pub fn covariance_between(&self, a: &str, b: &str) -> Result<f64, CmaError> {
        Ok(self.covariance[(self.position(a)?, self.position(b)?)])
    }

    /// `β_{asset→reference} = Cov(asset, reference) / Var(reference)`.
    pub fn beta(&self, asset: &str, reference: &str) -> Result<f64, CmaError> {
        let i = self.position(asset)?;
        let j = self.position(reference)?;
        let var_ref = self.covariance[(j, j)];
        if var_ref <= 0.0 {
            return Err(CmaError::degenerate(format!(
                "Beta of '{asset}' to '{reference}': reference has zero variance."
            )));
        }
        Ok(self.covariance[(i, j)] / var_ref)
    }

    /// Volatility not explained by the reference: `sqrt(σ_i² − β² σ_ref²)`.
    pub fn residual_risk(&self, asset: &str, reference: &str) -> Result<f64, CmaError> {
        let beta = self.beta(asset, reference)?;
        let i = self.position(asset)?;
        let j = self.position(reference)?;
        let radicand = self.covariance[(i, i)] - beta * beta * self.covariance[(j, j)];
        if radicand < 0.0 {
            if radicand > -RADICAND_TOLERANCE {
                return Ok(0.0);
            }
            return Err(CmaError::degenerate(format!(
                "Residual variance of '{asset}' against '{reference}' is negative ({radicand})."
            )));
        }
        Ok(radicand.sqrt())
    }

    /// Beta of every asset to its configured reference.
    pub fn betas(&self, records: &[AssetRecord]) -> Vec<(AssetId, Result<Modeled<f64>, CmaError>)> {
        records
            .iter()
            .filter(|r| self.index.contains_key(&r.name))
            .map(|r| {
                let beta = match &r.beta_reference {
                    Modeled::NotApplicable => Ok(Modeled::NotApplicable),
                    Modeled::Value(reference) => self.beta(&r.name, reference).map(Modeled::Value),
                };
                (r.name.clone(), beta)
            })
            .collect()
    }
}
