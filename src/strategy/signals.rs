use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::agents::AgentKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    /// +1 for long, -1 for short, 0 for neutral.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Neutral => 0.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
            Direction::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeHorizon {
    Short,
    Medium,
    Long,
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeHorizon::Short => write!(f, "short"),
            TimeHorizon::Medium => write!(f, "medium"),
            TimeHorizon::Long => write!(f, "long"),
        }
    }
}

/// A directional view on one asset class, produced once per cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingSignal {
    pub timestamp: DateTime<Utc>,
    pub asset_class: String,
    pub direction: Direction,
    pub conviction: f64,
    pub position_size: f64,
    pub time_horizon: TimeHorizon,
    pub risk_factors: BTreeSet<String>,
    pub supporting_agents: BTreeSet<AgentKind>,
    pub market_regime: String,
}

impl TradingSignal {
    pub fn new(
        timestamp: DateTime<Utc>,
        asset_class: impl Into<String>,
        direction: Direction,
        conviction: f64,
        position_size: f64,
        time_horizon: TimeHorizon,
    ) -> Self {
        Self {
            timestamp,
            asset_class: asset_class.into(),
            direction,
            conviction: conviction.clamp(0.0, 1.0),
            position_size: position_size.clamp(0.0, 1.0),
            time_horizon,
            risk_factors: BTreeSet::new(),
            supporting_agents: BTreeSet::new(),
            market_regime: String::new(),
        }
    }

    pub fn with_risk_factor(mut self, factor: &str) -> Self {
        self.risk_factors.insert(factor.to_string());
        self
    }

    pub fn with_supporting_agent(mut self, agent: AgentKind) -> Self {
        self.supporting_agents.insert(agent);
        self
    }

    pub fn with_regime(mut self, regime: impl Into<String>) -> Self {
        self.market_regime = regime.into();
        self
    }

    /// Risk consumed by this signal: conviction x position size.
    pub fn risk_contribution(&self) -> f64 {
        self.conviction * self.position_size
    }

    /// Position size signed by direction.
    pub fn signed_size(&self) -> f64 {
        self.direction.sign() * self.position_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_serializes_flat() {
        let signal = TradingSignal::new(Utc::now(), "USD", Direction::Short, 0.5, 0.2, TimeHorizon::Short)
            .with_risk_factor("fx_volatility")
            .with_supporting_agent(AgentKind::CentralBank);

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["direction"], "short");
        assert_eq!(json["time_horizon"], "short");
        assert_eq!(json["supporting_agents"][0], "central_bank");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_signed_size() {
        let short = TradingSignal::new(Utc::now(), "equities", Direction::Short, 0.5, 0.4, TimeHorizon::Medium);
        assert_eq!(short.signed_size(), -0.4);
        assert!((short.risk_contribution() - 0.2).abs() < 1e-12);
    }
}
