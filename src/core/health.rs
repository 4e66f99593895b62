use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::agents::AgentKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub cycles_completed: u64,
    pub agents: BTreeMap<AgentKind, bool>,
}

#[derive(Debug, Default)]
struct HealthState {
    agents: BTreeMap<AgentKind, bool>,
    cycles_completed: u64,
}

#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    state: Arc<RwLock<HealthState>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            state: Arc::new(RwLock::new(HealthState::default())),
        }
    }

    /// "healthy" when every agent answered its last call, "degraded"
    /// when some did, "down" when none did.
    pub async fn get_status(&self) -> HealthStatus {
        let state = self.state.read().await;
        let healthy = state.agents.values().filter(|ok| **ok).count();

        let status = if state.agents.is_empty() {
            "starting"
        } else if healthy == state.agents.len() {
            "healthy"
        } else if healthy > 0 {
            "degraded"
        } else {
            "down"
        };

        HealthStatus {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            cycles_completed: state.cycles_completed,
            agents: state.agents.clone(),
        }
    }

    pub async fn update_agent(&self, agent: AgentKind, healthy: bool) {
        self.state.write().await.agents.insert(agent, healthy);
    }

    pub async fn record_cycle(&self) {
        self.state.write().await.cycles_completed += 1;
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
