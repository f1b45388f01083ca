//! Run report persistence. One report per `(symbol, timeframe, candle_ts)`;
//! re-running a cycle replaces the report in place.

use chrono::{DateTime, Utc};
use fx_paper_core::{Result, RunStatus};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{NewRunReport, RunReportRecord};

pub struct RunReportRepository;

impl RunReportRepository {
    /// Upserts the report for `(symbol, timeframe, candle_ts)`.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        run_id: Uuid,
        symbol: &str,
        timeframe: &str,
        candle_ts: DateTime<Utc>,
        status: RunStatus,
        report: &NewRunReport,
    ) -> Result<RunReportRecord> {
        let row = sqlx::query_as::<_, RunReportRecord>(
            r#"
            INSERT INTO run_reports
                (run_id, symbol, timeframe, candle_ts, status, intent_json, risk_json,
                 order_json, fill_json, positions_json, account_json,
                 summary_text, telegram_text, error_text, mode)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (symbol, timeframe, candle_ts) DO UPDATE
            SET status = EXCLUDED.status,
                intent_json = EXCLUDED.intent_json,
                risk_json = EXCLUDED.risk_json,
                order_json = EXCLUDED.order_json,
                fill_json = EXCLUDED.fill_json,
                positions_json = EXCLUDED.positions_json,
                account_json = EXCLUDED.account_json,
                summary_text = EXCLUDED.summary_text,
                telegram_text = EXCLUDED.telegram_text,
                error_text = EXCLUDED.error_text,
                mode = EXCLUDED.mode
            RETURNING *
            "#,
        )
        .bind(run_id)
        .bind(symbol)
        .bind(timeframe)
        .bind(candle_ts)
        .bind(status.as_str())
        .bind(&report.intent_json)
        .bind(&report.risk_json)
        .bind(&report.order_json)
        .bind(&report.fill_json)
        .bind(&report.positions_json)
        .bind(&report.account_json)
        .bind(&report.summary_text)
        .bind(&report.telegram_text)
        .bind(&report.error_text)
        .bind(&report.mode)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Report for the cycle key, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        candle_ts: DateTime<Utc>,
    ) -> Result<Option<RunReportRecord>> {
        let row = sqlx::query_as::<_, RunReportRecord>(
            "SELECT * FROM run_reports WHERE symbol = $1 AND timeframe = $2 AND candle_ts = $3",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(candle_ts)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Completed (OK or NOOP) report for the cycle key, if any. An ERROR
    /// report does not block a retry.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_terminal(
        executor: impl PgExecutor<'_>,
        symbol: &str,
        timeframe: &str,
        candle_ts: DateTime<Utc>,
    ) -> Result<Option<RunReportRecord>> {
        let row = sqlx::query_as::<_, RunReportRecord>(
            r#"
            SELECT * FROM run_reports
            WHERE symbol = $1 AND timeframe = $2 AND candle_ts = $3
              AND status IN ('OK', 'NOOP')
            "#,
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(candle_ts)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Report by run id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn by_run_id(
        executor: impl PgExecutor<'_>,
        run_id: Uuid,
    ) -> Result<Option<RunReportRecord>> {
        let row = sqlx::query_as::<_, RunReportRecord>("SELECT * FROM run_reports WHERE run_id = $1")
            .bind(run_id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Most recent reports, newest candle first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list(
        executor: impl PgExecutor<'_>,
        limit: i64,
    ) -> Result<Vec<RunReportRecord>> {
        let rows = sqlx::query_as::<_, RunReportRecord>(
            "SELECT * FROM run_reports ORDER BY candle_ts DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}
