//! Mark-to-market snapshot persistence. Snapshots are upserted per candle
//! time — a later recomputation replaces the earlier value in place.

use chrono::{DateTime, Utc};
use fx_paper_core::Result;
use rust_decimal::Decimal;
use sqlx::PgExecutor;

use crate::models::AccountSnapshotRecord;

pub struct SnapshotRepository;

impl SnapshotRepository {
    /// Upserts the snapshot for `(account_id, asof_open_time)`.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        account_id: i32,
        asof_open_time: DateTime<Utc>,
        balance: Decimal,
        equity: Decimal,
        unrealized_pnl: Decimal,
        margin_used: Decimal,
        free_margin: Decimal,
    ) -> Result<AccountSnapshotRecord> {
        let row = sqlx::query_as::<_, AccountSnapshotRecord>(
            r#"
            INSERT INTO account_snapshots
                (account_id, asof_open_time, balance, equity, unrealized_pnl, margin_used, free_margin)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (account_id, asof_open_time) DO UPDATE
            SET balance = EXCLUDED.balance,
                equity = EXCLUDED.equity,
                unrealized_pnl = EXCLUDED.unrealized_pnl,
                margin_used = EXCLUDED.margin_used,
                free_margin = EXCLUDED.free_margin
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(asof_open_time)
        .bind(balance)
        .bind(equity)
        .bind(unrealized_pnl)
        .bind(margin_used)
        .bind(free_margin)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Snapshot at exactly `asof_open_time`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn by_asof(
        executor: impl PgExecutor<'_>,
        account_id: i32,
        asof_open_time: DateTime<Utc>,
    ) -> Result<Option<AccountSnapshotRecord>> {
        let row = sqlx::query_as::<_, AccountSnapshotRecord>(
            "SELECT * FROM account_snapshots WHERE account_id = $1 AND asof_open_time = $2",
        )
        .bind(account_id)
        .bind(asof_open_time)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Latest snapshot for the account.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn latest(
        executor: impl PgExecutor<'_>,
        account_id: i32,
    ) -> Result<Option<AccountSnapshotRecord>> {
        let row = sqlx::query_as::<_, AccountSnapshotRecord>(
            r#"
            SELECT * FROM account_snapshots
            WHERE account_id = $1
            ORDER BY asof_open_time DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }
}
