pub mod config;
pub mod event_bus;
pub mod health;
pub mod logging;

pub use config::Config;
pub use event_bus::{AllocationEvent, EventBus};
pub use health::HealthChecker;
