use agent_allocator::agents::{Agent, AgentKind, AgentReports, StubAgent};
use agent_allocator::core::{self as app_core, Config};
use agent_allocator::monitoring::recorder;
use agent_allocator::trading::AllocationOrchestrator;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use warp::Filter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    app_core::logging::init_logging(&config.monitoring);

    tracing::info!("🚀 Agent allocator starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Limits: max position {:.0}%, max sector {:.0}%, VaR {:.0}%",
        config.risk.max_position_size * 100.0,
        config.risk.max_sector_exposure * 100.0,
        config.risk.var_limit * 100.0
    );

    let agents = load_agents(&config).await?;
    let mut orchestrator = AllocationOrchestrator::new(&config, agents);

    if let Some(path) = config.monitoring.record_path.clone() {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            if let Err(e) = recorder::run(rx, path).await {
                tracing::error!("❌ Recorder stopped: {:#}", e);
            }
        });
        orchestrator = orchestrator.with_recorder(tx);
    }

    let orchestrator = Arc::new(orchestrator);
    let cycles = orchestrator.clone().start();

    // Start HTTP endpoint
    let port = config.monitoring.health_port;
    tokio::spawn(serve(orchestrator, port));
    tracing::info!("✅ Health endpoint running on port {}", port);

    cycles.await.context("allocation loop panicked")?;
    Ok(())
}

/// One stub per agent, seeded from the canned reports file when configured.
async fn load_agents(config: &Config) -> Result<Vec<Arc<dyn Agent>>> {
    let Some(path) = &config.monitoring.reports_path else {
        return Ok(StubAgent::roster()
            .into_iter()
            .map(|agent| Arc::new(agent) as Arc<dyn Agent>)
            .collect());
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read agent reports from {}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path))?;
    let mut canned = AgentReports::from_json(Utc::now(), &value).reports;

    tracing::info!("📂 Loaded canned reports for {} agents from {}", canned.len(), path);

    Ok(AgentKind::ALL
        .iter()
        .map(|kind| {
            let agent = match canned.remove(kind) {
                Some(report) => StubAgent::new(*kind, report),
                None => StubAgent::empty(*kind),
            };
            Arc::new(agent) as Arc<dyn Agent>
        })
        .collect())
}

async fn serve(orchestrator: Arc<AllocationOrchestrator>, port: u16) {
    let health_checker = orchestrator.health();
    let health = warp::path("health")
        .and(warp::get())
        .and(warp::any().map(move || health_checker.clone()))
        .and_then(|checker: app_core::HealthChecker| async move {
            let status = checker.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    let recommendation = warp::path("recommendation")
        .and(warp::get())
        .and(warp::any().map(move || orchestrator.clone()))
        .and_then(|orchestrator: Arc<AllocationOrchestrator>| async move {
            match orchestrator.latest_cycle().await {
                Some(record) => Ok::<_, warp::Rejection>(warp::reply::json(&record)),
                None => Err(warp::reject::not_found()),
            }
        });

    warp::serve(health.or(recommendation))
        .run(([0, 0, 0, 0], port))
        .await;
}
