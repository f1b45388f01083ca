//! Deterministic synthetic market data.
//!
//! Bars are derived from a digest of `(symbol, timeframe, open_time)`, so
//! the same request always produces the same bars. Used by tests and as the
//! default provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fx_paper_core::{Result, Timeframe};
use md5::{Digest, Md5};
use rust_decimal::Decimal;

use crate::provider::{MarketDataProvider, RawCandle};

pub struct MockProvider;

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn seed(symbol: &str, timeframe: Timeframe, open_time: DateTime<Utc>) -> u128 {
        let key = format!(
            "{symbol}:{}:{}",
            timeframe.as_str(),
            open_time.to_rfc3339()
        );
        let digest = Md5::digest(key.as_bytes());
        u128::from_be_bytes(digest.into())
    }

    fn generate_candle(
        symbol: &str,
        timeframe: Timeframe,
        open_time: DateTime<Utc>,
    ) -> RawCandle {
        let seed = Self::seed(symbol, timeframe, open_time);

        let base_price = if symbol == "EURUSD" {
            Decimal::new(10800, 4)
        } else {
            Decimal::new(1000, 1)
        };

        // Offsets in tenths of a pip, scale 4.
        let price_seed = (seed % 1_000_000) as i64;
        let open_delta = Decimal::new(price_seed % 100 - 50, 4);
        let high_offset = Decimal::new(((seed / 1_000_000) % 100) as i64, 4);
        let low_offset = Decimal::new(((seed / 2_000_000) % 100) as i64, 4);
        let close_delta = Decimal::new(((seed / 3_000_000) % 100) as i64 - 50, 4);

        let open = base_price + open_delta;
        let close = open + close_delta;
        let high = (open + high_offset).max(open).max(close);
        let low = (open - low_offset).min(open).min(close);

        let volume = Decimal::from((seed % 100_000) as i64 + 10_000);

        RawCandle {
            symbol: symbol.to_string(),
            timeframe: timeframe.as_str().to_string(),
            open_time,
            open,
            high,
            low,
            close,
            volume: Some(volume),
            source: "mock".to_string(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawCandle>> {
        let mut candles = Vec::new();
        let mut current = timeframe.align_floor(start);
        while current < end {
            candles.push(Self::generate_candle(symbol, timeframe, current));
            current += timeframe.duration();
        }
        tracing::debug!(
            symbol,
            timeframe = timeframe.as_str(),
            count = candles.len(),
            "mock provider generated candles"
        );
        Ok(candles)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_same_inputs_same_outputs() {
        let provider = MockProvider::new();
        let (start, end) = window();
        let first = provider
            .fetch_candles("EURUSD", Timeframe::M5, start, end)
            .await
            .unwrap();
        let second = provider
            .fetch_candles("EURUSD", Timeframe::M5, start, end)
            .await
            .unwrap();

        assert_eq!(first.len(), 12);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.open_time, b.open_time);
            assert_eq!(a.open, b.open);
            assert_eq!(a.high, b.high);
            assert_eq!(a.low, b.low);
            assert_eq!(a.close, b.close);
            assert_eq!(a.volume, b.volume);
        }
    }

    #[tokio::test]
    async fn test_bars_are_aligned_and_ascending() {
        let provider = MockProvider::new();
        let (start, end) = window();
        let bars = provider
            .fetch_candles("EURUSD", Timeframe::M5, start, end)
            .await
            .unwrap();

        let mut prev: Option<DateTime<Utc>> = None;
        for bar in &bars {
            assert!(Timeframe::M5.is_aligned(bar.open_time));
            if let Some(p) = prev {
                assert_eq!(bar.open_time - p, Timeframe::M5.duration());
            }
            prev = Some(bar.open_time);
        }
    }

    #[tokio::test]
    async fn test_ohlc_sanity_holds() {
        let provider = MockProvider::new();
        let (start, end) = window();
        let bars = provider
            .fetch_candles("EURUSD", Timeframe::M5, start, end)
            .await
            .unwrap();

        for bar in &bars {
            assert!(bar.high >= bar.low);
            assert!(bar.high >= bar.open && bar.high >= bar.close);
            assert!(bar.low <= bar.open && bar.low <= bar.close);
        }
    }

    #[tokio::test]
    async fn test_different_symbols_differ() {
        let provider = MockProvider::new();
        let (start, end) = window();
        let eur = provider
            .fetch_candles("EURUSD", Timeframe::M5, start, end)
            .await
            .unwrap();
        let jpy = provider
            .fetch_candles("USDJPY", Timeframe::M5, start, end)
            .await
            .unwrap();
        assert_ne!(eur[0].open, jpy[0].open);
    }

    #[tokio::test]
    async fn test_misaligned_start_is_floored() {
        let provider = MockProvider::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 30).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).unwrap();
        let bars = provider
            .fetch_candles("EURUSD", Timeframe::M5, start, end)
            .await
            .unwrap();
        assert_eq!(
            bars[0].open_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        // End is exclusive: the bar opening at 00:10 is still forming.
        assert_eq!(bars.len(), 2);
    }
}
