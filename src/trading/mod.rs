pub mod decision_engine;
pub mod orchestrator;
pub mod portfolio;
pub mod risk_manager;

pub use decision_engine::DecisionEngine;
pub use orchestrator::{AllocationOrchestrator, CycleRecord};
pub use portfolio::{PortfolioRecommendation, PortfolioState};
pub use risk_manager::{CovarianceMatrix, RiskError, RiskLimits, RiskManager, RiskViolation};
