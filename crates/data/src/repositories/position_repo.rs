//! Netting position persistence. The position row and the account row are
//! the only hot mutable entities; writers take them `FOR UPDATE`.

use chrono::{DateTime, Utc};
use fx_paper_core::Result;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};

use crate::models::PositionRecord;

pub struct PositionRepository;

impl PositionRepository {
    /// Fetches the position for `(account_id, symbol)`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get(
        executor: impl PgExecutor<'_>,
        account_id: i32,
        symbol: &str,
    ) -> Result<Option<PositionRecord>> {
        let row = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE account_id = $1 AND symbol = $2",
        )
        .bind(account_id)
        .bind(symbol)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Fetches the position under an exclusive row lock. Must run inside a
    /// transaction.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_for_update(
        conn: &mut PgConnection,
        account_id: i32,
        symbol: &str,
    ) -> Result<Option<PositionRecord>> {
        let row = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE account_id = $1 AND symbol = $2 FOR UPDATE",
        )
        .bind(account_id)
        .bind(symbol)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    /// All open (non-zero) positions for the account.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn open_positions(
        executor: impl PgExecutor<'_>,
        account_id: i32,
    ) -> Result<Vec<PositionRecord>> {
        let rows = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE account_id = $1 AND net_qty <> 0 ORDER BY symbol",
        )
        .bind(account_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Stamps SL/TP hints on an existing position row. A no-op when the
    /// position row does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn set_hints(
        executor: impl PgExecutor<'_>,
        account_id: i32,
        symbol: &str,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE positions
            SET stop_loss = COALESCE($3, stop_loss),
                take_profit = COALESCE($4, take_profit)
            WHERE account_id = $1 AND symbol = $2
            "#,
        )
        .bind(account_id)
        .bind(symbol)
        .bind(stop_loss)
        .bind(take_profit)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Writes the full position state, inserting the row on first touch.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        account_id: i32,
        symbol: &str,
        net_qty: Decimal,
        avg_entry_price: Decimal,
        opened_at: Option<DateTime<Utc>>,
        updated_open_time: DateTime<Utc>,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        realized_pnl_cum: Decimal,
        entry_order_id: Option<i64>,
    ) -> Result<PositionRecord> {
        let row = sqlx::query_as::<_, PositionRecord>(
            r#"
            INSERT INTO positions
                (account_id, symbol, net_qty, avg_entry_price, opened_at, updated_open_time,
                 stop_loss, take_profit, realized_pnl_cum, entry_order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (account_id, symbol) DO UPDATE
            SET net_qty = EXCLUDED.net_qty,
                avg_entry_price = EXCLUDED.avg_entry_price,
                opened_at = EXCLUDED.opened_at,
                updated_open_time = EXCLUDED.updated_open_time,
                stop_loss = EXCLUDED.stop_loss,
                take_profit = EXCLUDED.take_profit,
                realized_pnl_cum = EXCLUDED.realized_pnl_cum,
                entry_order_id = EXCLUDED.entry_order_id
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(symbol)
        .bind(net_qty)
        .bind(avg_entry_price)
        .bind(opened_at)
        .bind(updated_open_time)
        .bind(stop_loss)
        .bind(take_profit)
        .bind(realized_pnl_cum)
        .bind(entry_order_id)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }
}
