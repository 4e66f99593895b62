pub mod extractors;
pub mod signals;

pub use signals::{Direction, TimeHorizon, TradingSignal};
