use async_trait::async_trait;
use thiserror::Error;

use super::reports::{AgentKind, AgentReport};

#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("{agent} failed: {reason}")]
    Failed { agent: AgentKind, reason: String },

    #[error("{agent} timed out after {timeout_ms}ms")]
    Timeout { agent: AgentKind, timeout_ms: u64 },
}

/// A research agent that produces one report per allocation cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn generate_report(&self) -> Result<AgentReport, AgentError>;
}

/// Agent that answers every cycle with the same report.
#[derive(Debug, Clone)]
pub struct StubAgent {
    kind: AgentKind,
    report: AgentReport,
}

impl StubAgent {
    pub fn new(kind: AgentKind, report: AgentReport) -> Self {
        Self { kind, report }
    }

    /// Stub with an empty report for its kind.
    pub fn empty(kind: AgentKind) -> Self {
        Self::new(
            kind,
            AgentReport::from_value(kind, serde_json::Value::Object(Default::default())),
        )
    }

    /// One empty stub per known agent.
    pub fn roster() -> Vec<StubAgent> {
        AgentKind::ALL.iter().map(|kind| StubAgent::empty(*kind)).collect()
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn generate_report(&self) -> Result<AgentReport, AgentError> {
        Ok(self.report.clone())
    }
}
