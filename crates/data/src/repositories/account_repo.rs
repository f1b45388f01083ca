//! Singleton account row access.

use chrono::{DateTime, Utc};
use fx_paper_core::Result;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};

use crate::models::AccountRecord;

/// The singleton account id.
pub const ACCOUNT_ID: i32 = 1;

pub struct AccountRepository;

impl AccountRepository {
    /// Fetches the account row.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get(executor: impl PgExecutor<'_>) -> Result<Option<AccountRecord>> {
        let row = sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts WHERE id = $1")
            .bind(ACCOUNT_ID)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Fetches the account row under an exclusive row lock. Must run inside
    /// a transaction.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_for_update(conn: &mut PgConnection) -> Result<Option<AccountRecord>> {
        let row =
            sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(ACCOUNT_ID)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row)
    }

    /// Ensures the singleton account row exists, creating it with the
    /// configured starting balance. Idempotent under concurrency via
    /// `ON CONFLICT DO NOTHING`.
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn ensure(
        conn: &mut PgConnection,
        initial_balance: Decimal,
        currency: &str,
        leverage: Decimal,
        ts: DateTime<Utc>,
    ) -> Result<AccountRecord> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, currency, leverage, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(ACCOUNT_ID)
        .bind(initial_balance)
        .bind(currency)
        .bind(leverage)
        .bind(ts)
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts WHERE id = $1")
            .bind(ACCOUNT_ID)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Applies a realized PnL delta to the balance.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn add_balance(
        executor: impl PgExecutor<'_>,
        delta: Decimal,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE accounts SET balance = balance + $2, updated_at = $3 WHERE id = $1")
            .bind(ACCOUNT_ID)
            .bind(delta)
            .bind(ts)
            .execute(executor)
            .await?;
        Ok(())
    }
}
