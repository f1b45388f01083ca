pub mod config;
pub mod config_loader;
pub mod error;
pub mod types;

pub use config::{
    AccountConfig, AppConfig, DatabaseConfig, ExecutionConfig, MarketDataConfig, OmsConfig,
    RiskConfig, ServerConfig, StrategyConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{EngineError, Result};
pub use types::{ExitReason, IntentAction, OrderStatus, OrderType, RunStatus, Side, Timeframe};
