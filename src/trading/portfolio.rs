use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Live portfolio, owned by the orchestrator. Only `apply` mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioState {
    pub positions: BTreeMap<String, f64>,
    pub sectors: BTreeMap<String, f64>,
    pub risk_budget: BTreeMap<String, f64>,
    pub last_rebalance: Option<DateTime<Utc>>,
}

impl PortfolioState {
    pub fn total_risk_budget(&self) -> f64 {
        self.risk_budget.values().sum()
    }

    pub fn apply(&mut self, recommendation: &PortfolioRecommendation, at: DateTime<Utc>) {
        self.positions = recommendation.asset_allocation.clone();
        self.sectors = recommendation.sector_weights.clone();
        self.risk_budget = recommendation.risk_budget.clone();
        self.last_rebalance = Some(at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioRecommendation {
    pub generated_at: DateTime<Utc>,
    pub asset_allocation: BTreeMap<String, f64>,
    /// Signed: positive is a long tilt.
    pub sector_weights: BTreeMap<String, f64>,
    pub regional_weights: BTreeMap<String, f64>,
    pub risk_budget: BTreeMap<String, f64>,
    pub hedges: BTreeSet<String>,
    pub cash_allocation: f64,
    pub leverage: f64,
}

impl PortfolioRecommendation {
    pub fn total_allocation(&self) -> f64 {
        self.asset_allocation.values().sum()
    }
}
