use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::decision_engine::DecisionEngine;
use super::portfolio::{PortfolioRecommendation, PortfolioState};
use super::risk_manager::{CovarianceMatrix, RiskManager};
use crate::agents::{Agent, AgentError, AgentKind, AgentReport, AgentReports};
use crate::core::{AllocationEvent, Config, EventBus, HealthChecker};
use crate::strategy::TradingSignal;

/// Everything one allocation cycle saw and decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub failed_agents: Vec<AgentKind>,
    pub signals: Vec<TradingSignal>,
    /// Kelly-sized position per validated signal.
    pub sized_positions: BTreeMap<String, f64>,
    pub recommendation: PortfolioRecommendation,
    pub portfolio_var: f64,
    pub rebalanced: bool,
}

pub struct AllocationOrchestrator {
    agents: Vec<Arc<dyn Agent>>,
    engine: DecisionEngine,
    portfolio: Arc<RwLock<PortfolioState>>,
    latest: Arc<RwLock<Option<CycleRecord>>>,
    health: HealthChecker,
    events: EventBus,
    recorder: Option<mpsc::Sender<CycleRecord>>,
    agent_timeout: Duration,
    rebalance_interval: Duration,
    market_volatility: f64,
    covariance: CovarianceMatrix,
}

impl AllocationOrchestrator {
    pub fn new(config: &Config, agents: Vec<Arc<dyn Agent>>) -> Self {
        let engine = DecisionEngine::new(
            RiskManager::new(config.risk.clone()),
            config.agents.weights.clone(),
            config.allocation.regional_weights.clone(),
        );

        Self {
            agents,
            engine,
            portfolio: Arc::new(RwLock::new(PortfolioState::default())),
            latest: Arc::new(RwLock::new(None)),
            health: HealthChecker::new(),
            events: EventBus::new(256),
            recorder: None,
            agent_timeout: Duration::from_millis(config.agents.timeout_ms),
            rebalance_interval: Duration::from_secs(config.orchestrator.rebalance_interval_secs),
            market_volatility: config.allocation.market_volatility,
            covariance: config.allocation.covariance.clone(),
        }
    }

    pub fn with_recorder(mut self, recorder: mpsc::Sender<CycleRecord>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn health(&self) -> HealthChecker {
        self.health.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AllocationEvent> {
        self.events.subscribe()
    }

    pub async fn portfolio(&self) -> PortfolioState {
        self.portfolio.read().await.clone()
    }

    pub async fn latest_cycle(&self) -> Option<CycleRecord> {
        self.latest.read().await.clone()
    }

    /// Calls every agent concurrently. Failures and timeouts become
    /// `AgentReport::Failed` entries.
    pub async fn collect_reports(&self, as_of: DateTime<Utc>) -> AgentReports {
        let timeout = self.agent_timeout;

        let calls = self.agents.iter().map(|agent| async move {
            let kind = agent.kind();
            let outcome = match tokio::time::timeout(timeout, agent.generate_report()).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout {
                    agent: kind,
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            (kind, outcome)
        });

        let mut reports = AgentReports::new(as_of);
        for (kind, outcome) in join_all(calls).await {
            match outcome {
                Ok(report) => {
                    self.health.update_agent(kind, true).await;
                    reports.insert(kind, report);
                }
                Err(e) => {
                    tracing::error!("❌ Agent error: {}", e);
                    self.health.update_agent(kind, false).await;
                    reports.insert(kind, AgentReport::Failed { error: e.to_string() });
                }
            }
        }

        reports
    }

    pub async fn run_cycle(&self) -> Result<CycleRecord> {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!("🔄 Allocation cycle {} starting", cycle_id);

        let reports = self.collect_reports(started_at).await;
        let failed_agents = reports.failed_agents();
        for agent in &failed_agents {
            if let Some(AgentReport::Failed { error }) = reports.get(*agent) {
                self.events.publish(AllocationEvent::AgentFailed {
                    cycle_id,
                    agent: *agent,
                    error: error.clone(),
                });
            }
        }

        let signals = self.engine.aggregate_signals(&reports);
        let snapshot = self.portfolio.read().await.clone();
        let risk_manager = self.engine.risk_manager();

        let mut sized_positions = BTreeMap::new();
        for signal in &signals {
            match risk_manager.check_signal(signal, &snapshot) {
                Ok(()) => {
                    let size = risk_manager.size_position(signal, self.market_volatility);
                    sized_positions.insert(signal.asset_class.clone(), size);
                }
                Err(violation) => self.events.publish(AllocationEvent::SignalRejected {
                    cycle_id,
                    asset_class: signal.asset_class.clone(),
                    reason: violation.to_string(),
                }),
            }
        }

        let recommendation = self
            .engine
            .generate_portfolio_recommendation(&signals, &snapshot);
        self.events.publish(AllocationEvent::RecommendationIssued {
            cycle_id,
            signals: signals.len(),
            cash_allocation: recommendation.cash_allocation,
            timestamp: recommendation.generated_at,
        });

        for (a, b, correlation) in
            risk_manager.correlation_breaches(&recommendation.asset_allocation, &self.covariance)
        {
            tracing::warn!("⚠️  {} / {} correlation {:.2} above limit", a, b, correlation);
            self.events.publish(AllocationEvent::CorrelationLimitHit {
                cycle_id,
                assets: (a, b),
                correlation,
            });
        }

        let portfolio_var = risk_manager
            .calculate_portfolio_var(&recommendation.asset_allocation, &self.covariance)
            .context("VaR of recommended allocation")?;
        let var_limit = risk_manager.limits().var_limit;

        let rebalanced = if portfolio_var > var_limit {
            tracing::warn!(
                "❌ VaR {:.2}% exceeds limit {:.2}%, skipping rebalance",
                portfolio_var * 100.0,
                var_limit * 100.0
            );
            self.events.publish(AllocationEvent::VarLimitBreached {
                cycle_id,
                var: portfolio_var,
                limit: var_limit,
            });
            false
        } else {
            let now = Utc::now();
            self.portfolio.write().await.apply(&recommendation, now);
            self.events.publish(AllocationEvent::PortfolioRebalanced {
                cycle_id,
                timestamp: now,
            });
            true
        };

        let record = CycleRecord {
            cycle_id,
            started_at,
            failed_agents,
            signals,
            sized_positions,
            recommendation,
            portfolio_var,
            rebalanced,
        };

        self.health.record_cycle().await;
        *self.latest.write().await = Some(record.clone());

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.send(record.clone()).await {
                tracing::error!("❌ Failed to record cycle {}: {}", cycle_id, e);
            }
        }

        tracing::info!(
            "✅ Cycle {} done: {} signals, VaR {:.2}%, rebalanced={}",
            cycle_id,
            record.signals.len(),
            portfolio_var * 100.0,
            rebalanced
        );

        Ok(record)
    }

    /// Runs a cycle every rebalance interval until the task is aborted.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tracing::info!(
            "🚀 Allocation orchestrator starting with {} agents (every {}s)",
            self.agents.len(),
            self.rebalance_interval.as_secs()
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.rebalance_interval);

            loop {
                interval.tick().await;

                if let Err(e) = self.run_cycle().await {
                    tracing::error!("❌ Allocation cycle failed: {:#}", e);
                }
            }
        })
    }
}
