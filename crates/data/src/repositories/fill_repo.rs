//! Fill persistence. The unique index on `order_id` guarantees at most one
//! fill per order across retries.

use chrono::{DateTime, Utc};
use fx_paper_core::Result;
use sqlx::PgExecutor;

use crate::models::{FillRecord, NewFill};

pub struct FillRepository;

impl FillRepository {
    /// Inserts a fill row and returns it. Fails on a duplicate `order_id`.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert(executor: impl PgExecutor<'_>, fill: &NewFill) -> Result<FillRecord> {
        let row = sqlx::query_as::<_, FillRecord>(
            r#"
            INSERT INTO fills (order_id, ts, symbol, side, qty, price, fee, slippage)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(fill.order_id)
        .bind(fill.ts)
        .bind(&fill.symbol)
        .bind(fill.side.as_str())
        .bind(fill.qty)
        .bind(fill.price)
        .bind(fill.fee)
        .bind(fill.slippage)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Fetches the fill for an order, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn by_order_id(
        executor: impl PgExecutor<'_>,
        order_id: i64,
    ) -> Result<Option<FillRecord>> {
        let row = sqlx::query_as::<_, FillRecord>("SELECT * FROM fills WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Fetches a fill by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn by_id(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<FillRecord>> {
        let row = sqlx::query_as::<_, FillRecord>("SELECT * FROM fills WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Unaccounted fills with `ts <= asof`, in deterministic `(ts, id)`
    /// order — the consumption order of the accounting engine.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn unaccounted_up_to(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        asof: DateTime<Utc>,
    ) -> Result<Vec<FillRecord>> {
        let rows = sqlx::query_as::<_, FillRecord>(
            r#"
            SELECT * FROM fills
            WHERE symbol = $1 AND ts <= $2 AND accounted_at_open_time IS NULL
            ORDER BY ts ASC, id ASC
            "#,
        )
        .bind(symbol)
        .bind(asof)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Stamps a fill as consumed by accounting at `asof`.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn mark_accounted(
        executor: impl PgExecutor<'_>,
        fill_id: i64,
        asof: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE fills SET accounted_at_open_time = $2 WHERE id = $1")
            .bind(fill_id)
            .bind(asof)
            .execute(executor)
            .await?;
        Ok(())
    }
}
