//! Broker-backed market data fetcher.
//!
//! Pulls closed candles from an HTTP market-data endpoint. All failures map
//! to `VendorUnavailable` so callers can retry; the request deadline aborts
//! the fetch before anything is written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fx_paper_core::{EngineError, Result, Timeframe};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::provider::{MarketDataProvider, RawCandle};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct BrokerCandle {
    open_time: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Option<Decimal>,
}

pub struct BrokerProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BrokerProvider {
    /// Creates a broker provider against the given API base URL.
    ///
    /// # Errors
    /// Returns a vendor error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::vendor(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for BrokerProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawCandle>> {
        let url = format!("{}/v1/candles", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("timeframe", timeframe.as_str()),
                ("start", &start.to_rfc3339()),
                ("end", &end.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|e| EngineError::vendor(format!("candle fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::vendor(format!(
                "candle fetch returned {}",
                response.status()
            )));
        }

        let rows: Vec<BrokerCandle> = response
            .json()
            .await
            .map_err(|e| EngineError::vendor(format!("candle payload decode failed: {e}")))?;

        tracing::debug!(symbol, count = rows.len(), "broker returned candles");

        Ok(rows
            .into_iter()
            .map(|row| RawCandle {
                symbol: symbol.to_string(),
                timeframe: timeframe.as_str().to_string(),
                open_time: row.open_time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                source: "broker".to_string(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "broker"
    }
}
