use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::MonitoringConfig;

/// `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &MonitoringConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_compact {
        registry.with(fmt::layer().compact().with_target(false)).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    tracing::info!("Logging initialized at level: {}", config.log_level);
}
