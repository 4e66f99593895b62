use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

use super::portfolio::{PortfolioRecommendation, PortfolioState};
use super::risk_manager::RiskManager;
use crate::agents::AgentReports;
use crate::core::config::AgentWeights;
use crate::strategy::extractors::{self, RISK_ASSETS, SAFE_HAVENS};
use crate::strategy::{Direction, TradingSignal};

/// Starting policy before any signal is applied.
pub const BASE_ALLOCATION: [(&str, f64); 4] = [
    ("equities", 0.6),
    ("bonds", 0.3),
    ("commodities", 0.05),
    ("cash", 0.05),
];

/// Folds agent reports into signals, and signals into a portfolio recommendation.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    risk_manager: RiskManager,
    agent_weights: AgentWeights,
    regional_weights: BTreeMap<String, f64>,
}

impl DecisionEngine {
    pub fn new(
        risk_manager: RiskManager,
        agent_weights: AgentWeights,
        regional_weights: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            risk_manager,
            agent_weights,
            regional_weights,
        }
    }

    pub fn risk_manager(&self) -> &RiskManager {
        &self.risk_manager
    }

    /// Runs macro, sector rotation, currency and risk-on/off extraction in
    /// that order. Signals on the same asset class are not reconciled here.
    pub fn aggregate_signals(&self, reports: &AgentReports) -> Vec<TradingSignal> {
        let mut signals = Vec::new();

        signals.extend(extractors::extract_macro_signal(reports));
        signals.extend(extractors::extract_sector_rotation_signals(
            reports,
            &self.agent_weights,
        ));
        signals.extend(extractors::extract_currency_signal(reports));
        signals.extend(extractors::extract_risk_regime_signal(
            reports,
            &self.agent_weights,
        ));

        tracing::info!(
            "🎯 {} signals from {} agent reports",
            signals.len(),
            reports.reports.len()
        );

        signals
    }

    pub fn generate_portfolio_recommendation(
        &self,
        signals: &[TradingSignal],
        current_portfolio: &PortfolioState,
    ) -> PortfolioRecommendation {
        let mut allocation: BTreeMap<String, f64> = BASE_ALLOCATION
            .iter()
            .map(|(bucket, weight)| (bucket.to_string(), *weight))
            .collect();
        let mut sector_weights = BTreeMap::new();
        let mut hedges = BTreeSet::new();

        for signal in signals {
            if !self.risk_manager.validate_signal(signal, current_portfolio) {
                continue;
            }

            let size = signal.position_size;
            match (signal.asset_class.as_str(), signal.direction) {
                (bucket, _) if allocation.contains_key(bucket) => {
                    shift(&mut allocation, bucket, signal.signed_size());
                }
                (RISK_ASSETS, Direction::Long) => {
                    shift(&mut allocation, "equities", 0.5 * size);
                    shift(&mut allocation, "bonds", -0.3 * size);
                }
                (SAFE_HAVENS, Direction::Long) => {
                    shift(&mut allocation, "bonds", 0.4 * size);
                    shift(&mut allocation, "cash", 0.2 * size);
                    shift(&mut allocation, "equities", -0.4 * size);
                }
                // Only a long call moves the synthetic buckets.
                (RISK_ASSETS | SAFE_HAVENS, _) => {}
                _ => {
                    // last write wins within a cycle
                    sector_weights.insert(signal.asset_class.clone(), signal.signed_size());
                }
            }

            hedges.extend(signal.risk_factors.iter().cloned());
        }

        let total: f64 = allocation.values().sum();
        if total != 0.0 {
            for weight in allocation.values_mut() {
                *weight /= total;
            }
        } else {
            tracing::warn!("⚠️  Allocation sums to zero, leaving it un-normalised");
        }

        // Gross risk over every signal, validated or not.
        let risk_budget: BTreeMap<String, f64> = signals
            .iter()
            .map(|s| (s.asset_class.clone(), s.risk_contribution()))
            .collect();

        let cash_allocation = allocation.get("cash").copied().unwrap_or(0.0);

        tracing::info!(
            "📈 Recommendation: equities={:.1}%, bonds={:.1}%, cash={:.1}%, {} sector tilts",
            allocation.get("equities").copied().unwrap_or(0.0) * 100.0,
            allocation.get("bonds").copied().unwrap_or(0.0) * 100.0,
            cash_allocation * 100.0,
            sector_weights.len()
        );

        PortfolioRecommendation {
            generated_at: Utc::now(),
            asset_allocation: allocation,
            sector_weights,
            regional_weights: self.regional_weights.clone(),
            risk_budget,
            hedges,
            cash_allocation,
            leverage: 1.0,
        }
    }
}

fn shift(allocation: &mut BTreeMap<String, f64>, bucket: &str, amount: f64) {
    *allocation.entry(bucket.to_string()).or_insert(0.0) += amount;
}
