//! Market-data vendor adapter.
//!
//! The adapter is a capability: `fetch_candles` must return closed, aligned,
//! UTC-timestamped bars in ascending order and have no side effects on the
//! core. Concrete variants are selected by the `market_data.provider` config
//! string.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fx_paper_core::{EngineError, MarketDataConfig, Result, Timeframe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::broker::BrokerProvider;
use crate::mock::MockProvider;

/// A candle as returned by a vendor, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandle {
    pub symbol: String,
    pub timeframe: String,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub source: String,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches closed candles for `[start, end)`.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawCandle>>;

    /// Provider name for logs and ingest metadata.
    fn name(&self) -> &'static str;
}

/// Builds the configured provider.
///
/// # Errors
/// Returns a validation error for an unknown provider string.
pub fn build_provider(config: &MarketDataConfig) -> Result<Arc<dyn MarketDataProvider>> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new())),
        "real" => Ok(Arc::new(BrokerProvider::new(&config.broker_api_url)?)),
        other => Err(EngineError::validation(format!(
            "unknown market data provider: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider_mock() {
        let config = MarketDataConfig::default();
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_build_provider_rejects_unknown() {
        let config = MarketDataConfig {
            provider: "carrier-pigeon".to_string(),
            ..MarketDataConfig::default()
        };
        assert!(build_provider(&config).is_err());
    }
}
