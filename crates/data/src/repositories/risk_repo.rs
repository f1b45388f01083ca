//! Risk limits and daily equity baseline persistence.

use chrono::NaiveDate;
use fx_paper_core::{Result, RiskConfig};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};

use crate::models::{DailyEquityRecord, RiskLimitsRecord};

pub struct RiskRepository;

impl RiskRepository {
    /// Fetches the limits row for an account.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_limits(
        executor: impl PgExecutor<'_>,
        account_id: i32,
    ) -> Result<Option<RiskLimitsRecord>> {
        let row =
            sqlx::query_as::<_, RiskLimitsRecord>("SELECT * FROM risk_limits WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(executor)
                .await?;
        Ok(row)
    }

    /// Ensures the limits row exists, seeding it from config on first touch.
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn ensure_limits(
        conn: &mut PgConnection,
        account_id: i32,
        config: &RiskConfig,
        leverage: Decimal,
    ) -> Result<RiskLimitsRecord> {
        sqlx::query(
            r#"
            INSERT INTO risk_limits
                (account_id, max_open_positions, max_open_positions_per_symbol,
                 max_total_notional, max_symbol_notional, risk_per_trade_pct,
                 daily_loss_limit_pct, daily_loss_limit_amount, leverage, lot_step)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(config.max_open_positions)
        .bind(config.max_open_positions_per_symbol)
        .bind(config.max_total_notional)
        .bind(config.max_symbol_notional)
        .bind(config.risk_per_trade_pct)
        .bind(config.daily_loss_limit_pct)
        .bind(config.daily_loss_limit_amount)
        .bind(leverage)
        .bind(config.lot_step)
        .execute(&mut *conn)
        .await?;

        let row =
            sqlx::query_as::<_, RiskLimitsRecord>("SELECT * FROM risk_limits WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(row)
    }

    /// Ensures the daily baseline row for `(account_id, day)`, creating it
    /// with the supplied equity on first touch and maintaining `min_equity`
    /// afterwards. Idempotent.
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn ensure_daily_equity(
        conn: &mut PgConnection,
        account_id: i32,
        day: NaiveDate,
        equity: Decimal,
    ) -> Result<DailyEquityRecord> {
        sqlx::query(
            r#"
            INSERT INTO daily_equity (account_id, day, day_start_equity, min_equity)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (account_id, day) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(day)
        .bind(equity)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            UPDATE daily_equity SET min_equity = $3
            WHERE account_id = $1 AND day = $2 AND min_equity > $3
            "#,
        )
        .bind(account_id)
        .bind(day)
        .bind(equity)
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, DailyEquityRecord>(
            "SELECT * FROM daily_equity WHERE account_id = $1 AND day = $2",
        )
        .bind(account_id)
        .bind(day)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }
}
