pub mod agents;
pub mod core;
pub mod monitoring;
pub mod strategy;
pub mod trading;
