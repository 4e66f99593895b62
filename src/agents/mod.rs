pub mod agent;
pub mod reports;

pub use agent::{Agent, AgentError, StubAgent};
pub use reports::{
    AgentKind, AgentReport, AgentReports, CentralBankReport, CyclePhase, GeopoliticalReport,
    InstitutionalFlowReport, MacroCycleReport, PolicyStance, RotationCall, SentimentReport,
};
