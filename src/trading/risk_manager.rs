use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::portfolio::PortfolioState;
use crate::strategy::TradingSignal;

/// Assumed ceiling on any asset's annual return.
const MAX_EXPECTED_RETURN: f64 = 0.15;
const VOLATILITY_FLOOR: f64 = 0.1;
const KELLY_SAFETY_FACTOR: f64 = 0.25;
/// One-sided 95% normal quantile.
const VAR_Z_SCORE: f64 = 1.645;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskLimits {
    pub max_position_size: f64,   // Fraction of portfolio per signal
    pub max_sector_exposure: f64, // Existing + new exposure per asset class
    pub var_limit: f64,           // 95% VaR as fraction of portfolio
    pub correlation_limit: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: 0.10,
            max_sector_exposure: 0.25,
            var_limit: 0.25,
            correlation_limit: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskViolation {
    #[error("position {size:.3} exceeds max position size {limit:.3}")]
    PositionSize { size: f64, limit: f64 },

    #[error("{asset_class} exposure {exposure:.3} would exceed sector limit {limit:.3}")]
    SectorExposure {
        asset_class: String,
        exposure: f64,
        limit: f64,
    },

    #[error("risk budget {budget:.3} would exceed 1.0")]
    RiskBudget { budget: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("covariance matrix is {rows}x{cols} for {assets} assets")]
    CovarianceShape {
        rows: usize,
        cols: usize,
        assets: usize,
    },

    #[error("no covariance entry for position {0}")]
    UnknownAsset(String),
}

/// Square return covariance with the asset key of each row/column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CovarianceMatrix {
    assets: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
    pub fn new(assets: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self, RiskError> {
        let matrix = Self { assets, values };
        matrix.check_shape()?;
        Ok(matrix)
    }

    /// Uncorrelated assets with the given volatilities.
    pub fn diagonal(vols: &[(&str, f64)]) -> Self {
        let n = vols.len();
        let values = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { vols[i].1 * vols[i].1 } else { 0.0 })
                    .collect()
            })
            .collect();

        Self {
            assets: vols.iter().map(|(asset, _)| asset.to_string()).collect(),
            values,
        }
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn check_shape(&self) -> Result<(), RiskError> {
        let n = self.assets.len();
        let rows = self.values.len();
        if let Some(bad) = self.values.iter().find(|row| row.len() != n) {
            return Err(RiskError::CovarianceShape {
                rows,
                cols: bad.len(),
                assets: n,
            });
        }
        if rows != n {
            return Err(RiskError::CovarianceShape {
                rows,
                cols: n,
                assets: n,
            });
        }
        Ok(())
    }

    /// Pairwise correlation implied by the covariance, if both variances are positive.
    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        let denom = (self.values[i][i] * self.values[j][j]).sqrt();
        if denom > 0.0 {
            Some(self.values[i][j] / denom)
        } else {
            None
        }
    }

    fn index_of(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    limits: RiskLimits,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Checks a signal against the limits and the current portfolio.
    pub fn check_signal(
        &self,
        signal: &TradingSignal,
        portfolio: &PortfolioState,
    ) -> Result<(), RiskViolation> {
        if signal.position_size > self.limits.max_position_size {
            return Err(RiskViolation::PositionSize {
                size: signal.position_size,
                limit: self.limits.max_position_size,
            });
        }

        let existing = portfolio
            .sectors
            .get(&signal.asset_class)
            .copied()
            .unwrap_or(0.0);
        let exposure = existing + signal.position_size;
        if exposure > self.limits.max_sector_exposure {
            return Err(RiskViolation::SectorExposure {
                asset_class: signal.asset_class.clone(),
                exposure,
                limit: self.limits.max_sector_exposure,
            });
        }

        let budget = portfolio.total_risk_budget() + signal.risk_contribution();
        if budget > 1.0 {
            return Err(RiskViolation::RiskBudget { budget });
        }

        Ok(())
    }

    pub fn validate_signal(&self, signal: &TradingSignal, portfolio: &PortfolioState) -> bool {
        match self.check_signal(signal, portfolio) {
            Ok(()) => true,
            Err(violation) => {
                tracing::warn!("❌ {} {} rejected: {}", signal.direction, signal.asset_class, violation);
                false
            }
        }
    }

    /// Quarter-Kelly size, capped by the signal's request and the position limit.
    pub fn size_position(&self, signal: &TradingSignal, market_volatility: f64) -> f64 {
        let expected_return = signal.conviction * MAX_EXPECTED_RETURN;
        let volatility_adjusted_return = expected_return / market_volatility.max(VOLATILITY_FLOOR);
        let kelly_fraction = volatility_adjusted_return / market_volatility.powi(2);

        let size = (kelly_fraction * KELLY_SAFETY_FACTOR)
            .min(signal.position_size)
            .min(self.limits.max_position_size);

        tracing::debug!(
            "📊 Position sizing: {} conviction={:.2}, vol={:.3}, kelly={:.3}, size={:.2}%",
            signal.asset_class,
            signal.conviction,
            market_volatility,
            kelly_fraction,
            size * 100.0
        );

        size
    }

    /// Pairs of held assets whose correlation exceeds the correlation limit.
    pub fn correlation_breaches(
        &self,
        positions: &BTreeMap<String, f64>,
        covariance: &CovarianceMatrix,
    ) -> Vec<(String, String, f64)> {
        let held: Vec<&String> = positions
            .iter()
            .filter(|(_, weight)| **weight != 0.0)
            .map(|(asset, _)| asset)
            .collect();

        let mut breaches = Vec::new();
        for (n, a) in held.iter().enumerate() {
            for b in &held[n + 1..] {
                if let Some(rho) = covariance.correlation(a, b) {
                    if rho.abs() > self.limits.correlation_limit {
                        breaches.push(((*a).clone(), (*b).clone(), rho));
                    }
                }
            }
        }
        breaches
    }

    /// 95% one-sided VaR as a fraction of portfolio value, capped at 1.0.
    /// Positions are aligned to the matrix by asset key.
    pub fn calculate_portfolio_var(
        &self,
        positions: &BTreeMap<String, f64>,
        covariance: &CovarianceMatrix,
    ) -> Result<f64, RiskError> {
        if positions.is_empty() || covariance.is_empty() {
            return Ok(0.0);
        }
        covariance.check_shape()?;

        let mut weights = vec![0.0; covariance.assets.len()];
        for (asset, weight) in positions {
            let idx = covariance
                .index_of(asset)
                .ok_or_else(|| RiskError::UnknownAsset(asset.clone()))?;
            weights[idx] = *weight;
        }

        let variance: f64 = weights
            .iter()
            .enumerate()
            .map(|(i, wi)| {
                covariance.values[i]
                    .iter()
                    .zip(&weights)
                    .map(|(cov, wj)| wi * cov * wj)
                    .sum::<f64>()
            })
            .sum();

        let volatility = variance.max(0.0).sqrt();
        Ok((VAR_Z_SCORE * volatility).min(1.0))
    }
}
