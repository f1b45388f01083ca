//! Candle ingestion: fetch, validate, upsert, verify.
//!
//! Both `ingest` and `backfill` are retry-safe: the write path is a pure
//! upsert on the natural key, so re-running with the same vendor data is a
//! no-op.

use chrono::{DateTime, Duration, Utc};
use fx_paper_core::{EngineError, MarketDataConfig, Result, Timeframe};
use fx_paper_data::{CandleRepository, NewCandle};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use crate::integrity::{check_integrity, IntegrityReport};
use crate::provider::{MarketDataProvider, RawCandle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub symbol: String,
    pub timeframe: String,
    pub fetched: usize,
    pub validated: usize,
    pub skipped: usize,
    pub written: u64,
    pub latest_open_time: Option<DateTime<Utc>>,
    pub integrity: IntegrityReport,
}

pub struct IngestionService {
    provider: Arc<dyn MarketDataProvider>,
    config: MarketDataConfig,
}

impl IngestionService {
    #[must_use]
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: MarketDataConfig) -> Self {
        Self { provider, config }
    }

    fn timeframe(&self, timeframe: &str) -> Result<Timeframe> {
        Timeframe::parse(timeframe)
            .ok_or_else(|| EngineError::validation(format!("invalid timeframe: {timeframe}")))
    }

    /// Pulls candles from the vendor and upserts them.
    ///
    /// With an empty store the trailing `initial_backfill_days` window is
    /// fetched; otherwise the fetch starts `ingest_overlap_candles` before
    /// the latest stored bar so recent bars are re-validated against
    /// provider corrections. The upper bound is "now" aligned down to the
    /// grid, which excludes the still-forming bar.
    ///
    /// # Errors
    /// Returns vendor errors from the fetch and store errors from the
    /// upsert. Individual invalid candles are skipped, not fatal.
    pub async fn ingest(&self, pool: &PgPool, symbol: &str, timeframe: &str) -> Result<IngestReport> {
        let tf = self.timeframe(timeframe)?;
        let symbol = symbol.to_uppercase();

        let latest_stored = CandleRepository::latest(pool, &symbol, tf.as_str()).await?;
        let fetch_end = tf.align_floor(Utc::now());
        let fetch_start = match &latest_stored {
            None => {
                tracing::info!(
                    symbol,
                    timeframe = tf.as_str(),
                    days = self.config.initial_backfill_days,
                    "store empty, running initial backfill"
                );
                fetch_end - Duration::days(self.config.initial_backfill_days)
            }
            Some(candle) => {
                candle.open_time - tf.duration() * self.config.ingest_overlap_candles as i32
            }
        };

        self.fetch_and_upsert(pool, &symbol, tf, fetch_start, fetch_end)
            .await
    }

    /// Upserts candles for an explicit `[start, end)` range.
    ///
    /// # Errors
    /// Returns vendor errors from the fetch and store errors from the
    /// upsert.
    pub async fn backfill(
        &self,
        pool: &PgPool,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<IngestReport> {
        let tf = self.timeframe(timeframe)?;
        let symbol = symbol.to_uppercase();
        tracing::info!(
            symbol,
            timeframe = tf.as_str(),
            %start,
            %end,
            "backfilling explicit range"
        );
        self.fetch_and_upsert(pool, &symbol, tf, start, end).await
    }

    async fn fetch_and_upsert(
        &self,
        pool: &PgPool,
        symbol: &str,
        tf: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<IngestReport> {
        let raw = self.provider.fetch_candles(symbol, tf, start, end).await?;
        tracing::info!(
            symbol,
            provider = self.provider.name(),
            fetched = raw.len(),
            "provider returned candles"
        );

        let (validated, skipped) = validate_batch(&raw, symbol, tf);

        let mut tx = pool.begin().await?;
        let written = CandleRepository::upsert_many(&mut tx, &validated).await?;
        tx.commit().await?;

        let latest_after = CandleRepository::latest(pool, symbol, tf.as_str()).await?;
        let integrity_end = latest_after
            .as_ref()
            .map_or(end, |candle| candle.open_time);

        let mut conn = pool.acquire().await?;
        let integrity = check_integrity(&mut conn, symbol, tf, start, integrity_end).await?;

        Ok(IngestReport {
            symbol: symbol.to_string(),
            timeframe: tf.as_str().to_string(),
            fetched: raw.len(),
            validated: validated.len(),
            skipped,
            written,
            latest_open_time: latest_after.map(|candle| candle.open_time),
            integrity,
        })
    }
}

/// Validates a raw vendor batch, aligning each bar to the grid and dropping
/// rows that violate OHLC sanity. Returns the validated rows and the number
/// skipped.
#[must_use]
pub fn validate_batch(raw: &[RawCandle], symbol: &str, tf: Timeframe) -> (Vec<NewCandle>, usize) {
    let mut validated = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;
    for candle in raw {
        let open_time = tf.align_floor(candle.open_time);
        match NewCandle::validated(
            symbol,
            tf,
            open_time,
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume,
            &candle.source,
        ) {
            Ok(valid) => validated.push(valid),
            Err(err) => {
                skipped += 1;
                tracing::warn!(%open_time, %err, "skipping invalid candle");
            }
        }
    }
    (validated, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn raw(minute: u32, open: rust_decimal::Decimal, high: rust_decimal::Decimal) -> RawCandle {
        RawCandle {
            symbol: "EURUSD".to_string(),
            timeframe: "M5".to_string(),
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            open,
            high,
            low: open.min(high) - dec!(0.0001),
            close: open,
            volume: Some(dec!(1000)),
            source: "mock".to_string(),
        }
    }

    #[test]
    fn test_validate_batch_keeps_sane_rows() {
        let batch = vec![raw(0, dec!(1.08), dec!(1.081)), raw(5, dec!(1.08), dec!(1.082))];
        let (validated, skipped) = validate_batch(&batch, "EURUSD", Timeframe::M5);
        assert_eq!(validated.len(), 2);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_validate_batch_skips_bad_rows_without_failing() {
        // Second row: high below open violates OHLC sanity.
        let mut bad = raw(5, dec!(1.08), dec!(1.082));
        bad.high = dec!(1.0);
        bad.low = dec!(0.9);
        let batch = vec![raw(0, dec!(1.08), dec!(1.081)), bad];
        let (validated, skipped) = validate_batch(&batch, "EURUSD", Timeframe::M5);
        assert_eq!(validated.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_validate_batch_aligns_to_grid() {
        let mut off_grid = raw(0, dec!(1.08), dec!(1.081));
        off_grid.open_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 13).unwrap();
        let (validated, skipped) = validate_batch(&[off_grid], "EURUSD", Timeframe::M5);
        assert_eq!(skipped, 0);
        assert_eq!(
            validated[0].open_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
