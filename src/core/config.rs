use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

use crate::agents::AgentKind;
use crate::trading::decision_engine::BASE_ALLOCATION;
use crate::trading::risk_manager::{CovarianceMatrix, RiskLimits};

const DEFAULT_CONFIG_FILE: &str = "allocator.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub agents: AgentsConfig,
    pub risk: RiskLimits,
    pub allocation: AllocationConfig,
    pub orchestrator: OrchestratorConfig,
    pub monitoring: MonitoringConfig,
}

/// Per-agent weight, keyed by agent name. Missing agents weigh 0.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct AgentWeights(BTreeMap<String, f64>);

impl AgentWeights {
    pub fn from_pairs(pairs: &[(AgentKind, f64)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(kind, weight)| (kind.as_str().to_string(), *weight))
                .collect(),
        )
    }

    pub fn get(&self, kind: AgentKind) -> f64 {
        self.0.get(kind.as_str()).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub weights: AgentWeights,
    pub timeout_ms: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            weights: AgentWeights::from_pairs(&[
                (AgentKind::MacroCycle, 0.15),
                (AgentKind::CentralBank, 0.15),
                (AgentKind::Geopolitical, 0.10),
                (AgentKind::Sentiment, 0.10),
                (AgentKind::InstitutionalFlow, 0.10),
                (AgentKind::Commodity, 0.08),
                (AgentKind::Credit, 0.08),
                (AgentKind::Technical, 0.08),
                (AgentKind::AlternativeData, 0.08),
                (AgentKind::Regulatory, 0.08),
            ]),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Passed through untouched into every recommendation.
    pub regional_weights: BTreeMap<String, f64>,
    /// Volatility estimate used for Kelly sizing.
    pub market_volatility: f64,
    /// Return covariance of the base buckets, used for the VaR gate.
    pub covariance: CovarianceMatrix,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        let regional_weights = [
            ("north_america", 0.50),
            ("europe", 0.25),
            ("asia_pacific", 0.15),
            ("emerging_markets", 0.10),
        ]
        .into_iter()
        .map(|(region, weight)| (region.to_string(), weight))
        .collect();

        Self {
            regional_weights,
            market_volatility: 0.16,
            covariance: CovarianceMatrix::diagonal(&[
                ("equities", 0.16),
                ("bonds", 0.06),
                ("commodities", 0.20),
                ("cash", 0.0),
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub rebalance_interval_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rebalance_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub log_compact: bool,
    pub health_port: u16,
    /// JSONL file receiving one record per cycle.
    pub record_path: Option<String>,
    /// JSON file with canned agent reports for the stub agents.
    pub reports_path: Option<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_compact: false,
            health_port: 3000,
            record_path: None,
            reports_path: None,
        }
    }
}

impl Config {
    /// Defaults, then the optional config file (`ALLOCATOR_CONFIG`), then
    /// `ALLOCATOR__SECTION__KEY` environment overrides.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = env::var("ALLOCATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(&path)
    }

    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("ALLOCATOR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path))?;

        let config: Config = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((name, weight)) = self.agents.weights.iter().find(|(_, w)| **w < 0.0) {
            bail!("agent weight for {} is negative: {}", name, weight);
        }

        let limits = [
            ("max_position_size", self.risk.max_position_size),
            ("max_sector_exposure", self.risk.max_sector_exposure),
            ("var_limit", self.risk.var_limit),
            ("correlation_limit", self.risk.correlation_limit),
        ];
        for (name, value) in limits {
            if !(value > 0.0 && value <= 1.0) {
                bail!("risk.{} must be in (0, 1], got {}", name, value);
            }
        }

        if self.allocation.market_volatility <= 0.0 {
            bail!(
                "allocation.market_volatility must be positive, got {}",
                self.allocation.market_volatility
            );
        }

        self.allocation
            .covariance
            .check_shape()
            .context("allocation.covariance is malformed")?;

        // Empty disables the VaR gate; otherwise every base bucket needs a row.
        let covariance = &self.allocation.covariance;
        if !covariance.is_empty() {
            if let Some((bucket, _)) = BASE_ALLOCATION
                .iter()
                .find(|(bucket, _)| !covariance.assets().iter().any(|a| a == bucket))
            {
                bail!("allocation.covariance has no entry for {}", bucket);
            }
        }

        if self.orchestrator.rebalance_interval_secs == 0 {
            bail!("orchestrator.rebalance_interval_secs must be at least 1");
        }

        Ok(())
    }
}
