//! Order lifecycle persistence.

use chrono::{DateTime, Utc};
use fx_paper_core::{OrderStatus, Result};
use sqlx::PgExecutor;

use crate::models::{NewOrder, OrderRecord};

/// Filters for listing orders over the control surface.
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub symbol: Option<String>,
    pub status: Option<OrderStatus>,
    pub from_ts: Option<DateTime<Utc>>,
    pub to_ts: Option<DateTime<Utc>>,
    pub limit: i64,
}

pub struct OrderRepository;

impl OrderRepository {
    /// Inserts an order row and returns it.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including an idempotency-key
    /// unique violation).
    pub async fn insert(executor: impl PgExecutor<'_>, order: &NewOrder) -> Result<OrderRecord> {
        let row = sqlx::query_as::<_, OrderRecord>(
            r#"
            INSERT INTO orders (ts, symbol, side, type, qty, status, reason, requested_price, idempotency_key)
            VALUES ($1, $2, $3, 'market', $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(order.ts)
        .bind(&order.symbol)
        .bind(order.side.as_str())
        .bind(order.qty)
        .bind(order.status.as_str())
        .bind(&order.reason)
        .bind(order.requested_price)
        .bind(&order.idempotency_key)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Fetches an order by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn by_id(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<OrderRecord>> {
        let row = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Fetches an order by idempotency key.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn by_idempotency_key(
        executor: impl PgExecutor<'_>,
        key: &str,
    ) -> Result<Option<OrderRecord>> {
        let row =
            sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(executor)
                .await?;
        Ok(row)
    }

    /// NEW market orders for a symbol, in deterministic `(ts, id)` order —
    /// the scan order of the execution engine.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_new_market(
        executor: impl PgExecutor<'_>,
        symbol: &str,
    ) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT * FROM orders
            WHERE symbol = $1 AND upper(status) = 'NEW' AND lower(type) = 'market'
            ORDER BY ts ASC, id ASC
            "#,
        )
        .bind(symbol)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Lists orders with optional filters, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list(
        executor: impl PgExecutor<'_>,
        filters: &OrderFilters,
    ) -> Result<Vec<OrderRecord>> {
        let limit = if filters.limit > 0 { filters.limit } else { 100 };
        let rows = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT * FROM orders
            WHERE ($1::text IS NULL OR symbol = $1)
              AND ($2::text IS NULL OR upper(status) = $2)
              AND ($3::timestamptz IS NULL OR ts >= $3)
              AND ($4::timestamptz IS NULL OR ts <= $4)
            ORDER BY ts DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(&filters.symbol)
        .bind(filters.status.map(|s| s.as_str().to_string()))
        .bind(filters.from_ts)
        .bind(filters.to_ts)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Transitions an order's status, recording an optional reason.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn set_status(
        executor: impl PgExecutor<'_>,
        id: i64,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, reason = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(reason)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Timestamp of the most recent order for a symbol, for cooldown checks.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn latest_order_ts(
        executor: impl PgExecutor<'_>,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT ts FROM orders WHERE symbol = $1 ORDER BY ts DESC, id DESC LIMIT 1")
                .bind(symbol)
                .fetch_optional(executor)
                .await?;
        Ok(row.map(|r| r.0))
    }
}
