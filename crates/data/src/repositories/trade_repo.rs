//! Closed-lot trade persistence, append-only.

use fx_paper_core::Result;
use sqlx::PgExecutor;

use crate::models::{NewTrade, TradeRecord};

pub struct TradeRepository;

impl TradeRepository {
    /// Appends a closed lot.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert(executor: impl PgExecutor<'_>, trade: &NewTrade) -> Result<TradeRecord> {
        let row = sqlx::query_as::<_, TradeRecord>(
            r#"
            INSERT INTO trades
                (entry_ts, exit_ts, symbol, qty, entry_price, exit_price, pnl,
                 exit_reason, entry_order_id, exit_order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(trade.entry_ts)
        .bind(trade.exit_ts)
        .bind(&trade.symbol)
        .bind(trade.qty)
        .bind(trade.entry_price)
        .bind(trade.exit_price)
        .bind(trade.pnl)
        .bind(trade.exit_reason.as_str())
        .bind(trade.entry_order_id)
        .bind(trade.exit_order_id)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Lists trades for a symbol, most recent exit first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_for_symbol(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        limit: i64,
    ) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT * FROM trades
            WHERE symbol = $1
            ORDER BY exit_ts DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}
