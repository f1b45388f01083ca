//! Candle store queries.
//!
//! Writes are idempotent on `(symbol, timeframe, open_time)`: re-ingesting
//! equal values is a no-op, differing OHLC values overwrite (last writer by
//! `ingested_at`). Reads return UTC rows ordered by `open_time`.

use chrono::{DateTime, Utc};
use fx_paper_core::Result;
use sqlx::{PgConnection, PgExecutor};

use crate::models::{CandleRecord, NewCandle};

pub struct CandleRepository;

impl CandleRepository {
    /// Upserts a batch of validated candles inside the caller's transaction.
    ///
    /// # Returns
    /// The number of rows written (inserted or updated).
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn upsert_many(conn: &mut PgConnection, candles: &[NewCandle]) -> Result<u64> {
        let mut written = 0u64;
        for candle in candles {
            let result = sqlx::query(
                r#"
                INSERT INTO candles (symbol, timeframe, open_time, open, high, low, close, volume, source, ingested_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
                ON CONFLICT (symbol, timeframe, open_time) DO UPDATE
                SET open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume,
                    source = EXCLUDED.source,
                    ingested_at = EXCLUDED.ingested_at
                "#,
            )
            .bind(&candle.symbol)
            .bind(&candle.timeframe)
            .bind(candle.open_time)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .bind(&candle.source)
            .execute(&mut *conn)
            .await?;

            written += result.rows_affected();
        }
        Ok(written)
    }

    /// Latest stored candle for `(symbol, timeframe)`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn latest(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<CandleRecord>> {
        let row = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT * FROM candles
            WHERE symbol = $1 AND timeframe = $2
            ORDER BY open_time DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Latest candle with `open_time <= asof`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn latest_at_or_before(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        asof: DateTime<Utc>,
    ) -> Result<Option<CandleRecord>> {
        let row = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT * FROM candles
            WHERE symbol = $1 AND timeframe = $2 AND open_time <= $3
            ORDER BY open_time DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(asof)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Candle at exactly `open_time`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn exact(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        open_time: DateTime<Utc>,
    ) -> Result<Option<CandleRecord>> {
        let row = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT * FROM candles
            WHERE symbol = $1 AND timeframe = $2 AND open_time = $3
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(open_time)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// First candle with `open_time > after` — the next-open fill candle for
    /// an order placed at `after`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn next_after(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<CandleRecord>> {
        let row = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT * FROM candles
            WHERE symbol = $1 AND timeframe = $2 AND open_time > $3
            ORDER BY open_time ASC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(after)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// History query with optional bounds, ascending, capped at `limit`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn range(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<CandleRecord>> {
        let rows = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT * FROM candles
            WHERE symbol = $1 AND timeframe = $2
              AND ($3::timestamptz IS NULL OR open_time >= $3)
              AND ($4::timestamptz IS NULL OR open_time <= $4)
            ORDER BY open_time ASC
            LIMIT $5
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Ascending window of up to `limit` candles ending at `asof` inclusive.
    /// This is the strategy warmup window.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn recent_up_to(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        asof: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CandleRecord>> {
        let mut rows = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT * FROM candles
            WHERE symbol = $1 AND timeframe = $2 AND open_time <= $3
            ORDER BY open_time DESC
            LIMIT $4
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(asof)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        rows.reverse();
        Ok(rows)
    }

    /// Stored open times within `[start, end]`, ascending.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn open_times_in(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT open_time FROM candles
            WHERE symbol = $1 AND timeframe = $2
              AND open_time >= $3 AND open_time <= $4
            ORDER BY open_time ASC
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(start)
        .bind(end)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Number of `(symbol, timeframe, open_time)` groups carrying more than
    /// one row. Zero under the unique constraint; kept as a health check.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn duplicate_count(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM (
                SELECT open_time FROM candles
                WHERE symbol = $1 AND timeframe = $2
                  AND open_time >= $3 AND open_time <= $4
                GROUP BY open_time
                HAVING COUNT(*) > 1
            ) AS dups
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(start)
        .bind(end)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Deletes candles with `open_time` before the cutoff. Retention only.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn delete_before(
        executor: impl PgExecutor<'_>,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM candles WHERE open_time < $1")
            .bind(cutoff)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Deletes the candle at exactly `open_time`. Test and admin tooling.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn delete_exact(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        open_time: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM candles WHERE symbol = $1 AND timeframe = $2 AND open_time = $3",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(open_time)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
