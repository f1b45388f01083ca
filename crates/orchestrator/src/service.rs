//! One atomic per-candle cycle.
//!
//! `run_cycle` is idempotent on `(symbol, timeframe, candle_ts)`: the run
//! report's unique key plus the deterministic order idempotency key
//! guarantee at most one placed order per cycle, across retries and
//! restarts.

use chrono::{DateTime, Utc};
use fx_paper_accounting::AccountingEngine;
use fx_paper_core::{
    AppConfig, EngineError, IntentAction, OrderStatus, Result, RunStatus, Side, Timeframe,
};
use fx_paper_data::{
    CandleRepository, NewRunReport, OrderRepository, PositionRepository, RunReportRecord,
    RunReportRepository, ACCOUNT_ID,
};
use fx_paper_execution::ExecutionEngine;
use fx_paper_oms::{OmsService, PlaceOrderRequest};
use fx_paper_risk::RiskEngine;
use fx_paper_strategy::{EmaAtrStrategy, StrategyIntent, StrategyRunner};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Sized and risk-approved order derived from an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlan {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reason: String,
}

pub struct OrchestratorService {
    config: AppConfig,
    oms: OmsService,
    risk: RiskEngine,
    accounting: AccountingEngine,
    execution: ExecutionEngine,
    strategy: StrategyRunner,
}

impl OrchestratorService {
    /// Builds the orchestrator and its collaborators from config.
    ///
    /// # Errors
    /// Returns a validation error for inconsistent configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            oms: OmsService::from_config(config)?,
            risk: RiskEngine::from_config(config)?,
            accounting: AccountingEngine::new(config.account.clone(), config.execution.clone()),
            execution: ExecutionEngine::new(&config.execution),
            strategy: StrategyRunner::new(config.strategy.clone()),
        })
    }

    /// Deterministic run id for a cycle key.
    #[must_use]
    pub fn run_id(symbol: &str, timeframe: &str, candle_ts: DateTime<Utc>) -> Uuid {
        let seed = format!("{symbol}|{timeframe}|{}", candle_ts.to_rfc3339());
        Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())
    }

    /// Deterministic order idempotency key for a cycle's placement.
    #[must_use]
    pub fn order_idempotency_key(
        symbol: &str,
        timeframe: &str,
        candle_ts: DateTime<Utc>,
        side: Side,
    ) -> String {
        let seed = format!(
            "{symbol}|{timeframe}|{}|{}",
            candle_ts.to_rfc3339(),
            side.as_str()
        );
        Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).to_string()
    }

    /// Runs one cycle for `(symbol, timeframe, candle_ts)`.
    ///
    /// Returns the persisted run report. A prior OK or NOOP report is
    /// returned unchanged; any unexpected failure is captured as an ERROR
    /// report rather than propagated.
    ///
    /// # Errors
    /// `DeterministicSafety` when the cycle candle does not exist — in that
    /// case nothing is persisted, not even a report.
    pub async fn run_cycle(
        &self,
        pool: &PgPool,
        symbol: &str,
        timeframe: &str,
        candle_ts: DateTime<Utc>,
    ) -> Result<RunReportRecord> {
        let symbol = symbol.to_uppercase();
        let tf = Timeframe::parse(timeframe)
            .ok_or_else(|| EngineError::validation(format!("invalid timeframe: {timeframe}")))?;
        let run_id = Self::run_id(&symbol, tf.as_str(), candle_ts);

        let candle = CandleRepository::exact(pool, &symbol, tf.as_str(), candle_ts)
            .await?
            .ok_or_else(|| {
                EngineError::deterministic_safety(format!(
                    "cycle requires the candle at {candle_ts} for {symbol}/{}",
                    tf.as_str()
                ))
            })?;
        debug_assert_eq!(candle.open_time, candle_ts);

        if let Some(existing) =
            RunReportRepository::find_terminal(pool, &symbol, tf.as_str(), candle_ts).await?
        {
            tracing::debug!(%run_id, "cycle already completed, returning prior report");
            return Ok(existing);
        }

        let mut tx = pool.begin().await?;
        let outcome = self
            .run_cycle_inner(&mut tx, run_id, &symbol, tf, candle_ts)
            .await;

        match outcome {
            Ok((status, report)) => {
                let report = RunReportRepository::upsert(
                    &mut *tx,
                    run_id,
                    &symbol,
                    tf.as_str(),
                    candle_ts,
                    status,
                    &report,
                )
                .await?;
                tx.commit().await?;
                Ok(report)
            }
            Err(err) => {
                // Roll back the partial cycle and record the failure in a
                // fresh transaction; the process never crashes on a cycle.
                drop(tx);
                tracing::error!(%run_id, %err, "cycle failed, persisting ERROR report");
                let summary = format!("{symbol} {} {candle_ts} => ERROR", tf.as_str());
                let report = NewRunReport {
                    summary_text: summary.clone(),
                    telegram_text: Self::telegram_text(
                        run_id,
                        RunStatus::Error,
                        &symbol,
                        tf.as_str(),
                        candle_ts,
                        &err.to_string(),
                    ),
                    error_text: Some(err.to_string()),
                    mode: "execute".to_string(),
                    ..NewRunReport::default()
                };
                let report = RunReportRepository::upsert(
                    pool,
                    run_id,
                    &symbol,
                    tf.as_str(),
                    candle_ts,
                    RunStatus::Error,
                    &report,
                )
                .await?;
                Ok(report)
            }
        }
    }

    async fn run_cycle_inner(
        &self,
        conn: &mut PgConnection,
        run_id: Uuid,
        symbol: &str,
        tf: Timeframe,
        candle_ts: DateTime<Utc>,
    ) -> Result<(RunStatus, NewRunReport)> {
        let candle = CandleRepository::exact(&mut *conn, symbol, tf.as_str(), candle_ts)
            .await?
            .ok_or_else(|| {
                EngineError::deterministic_safety(format!("candle vanished at {candle_ts}"))
            })?;

        // Mark-to-market first so the risk gate sees equity at this candle.
        let snapshot = self.accounting.mark_to_market(conn, candle_ts, &candle).await?;
        let mut account_json = serde_json::to_value(&snapshot)
            .map_err(|e| EngineError::validation(format!("account encode failed: {e}")))?;

        // Settle orders whose next-open candle is this one. This is what
        // fills an order left NEW by the previous cycle, including across
        // restarts.
        let settled = self
            .execution
            .process_new_orders_for_candle(conn, candle_ts, symbol, tf.as_str())
            .await?;
        if !settled.is_empty() {
            let snapshot = self
                .accounting
                .process_accounting_for_candle(conn, symbol, tf.as_str(), candle_ts)
                .await?;
            account_json = serde_json::to_value(&snapshot)
                .map_err(|e| EngineError::validation(format!("account encode failed: {e}")))?;
            tracing::info!(count = settled.len(), "settled resting orders at cycle open");
        }

        let intent = self
            .strategy
            .intent_at(&mut *conn, EmaAtrStrategy::NAME, symbol, tf, candle_ts)
            .await?;
        let intent_json = serde_json::to_value(&intent)
            .map_err(|e| EngineError::validation(format!("intent encode failed: {e}")))?;

        let position = PositionRepository::get(&mut *conn, ACCOUNT_ID, symbol).await?;
        let open_qty = position.as_ref().map_or(Decimal::ZERO, |p| p.net_qty);

        // HOLD, or CLOSE with nothing to close, ends the cycle.
        let plan_side_qty = match intent.action {
            IntentAction::Hold => None,
            IntentAction::Close if open_qty.is_zero() => None,
            IntentAction::Close => {
                let side = if open_qty > Decimal::ZERO {
                    Side::Sell
                } else {
                    Side::Buy
                };
                Some((side, open_qty.abs()))
            }
            IntentAction::Buy => Some((Side::Buy, dec!(1))),
            IntentAction::Sell => Some((Side::Sell, dec!(1))),
        };
        let Some((side, requested_qty)) = plan_side_qty else {
            let report = self.noop_report(run_id, symbol, tf, candle_ts, &intent, NoopContext {
                intent_json,
                account_json,
                ..NoopContext::default()
            });
            return Ok((RunStatus::Noop, report));
        };

        if let Some(reason) = self
            .cooldown_block(&mut *conn, symbol, tf, candle_ts)
            .await?
        {
            let mut context = NoopContext::default();
            context.intent_json = intent_json;
            context.account_json = account_json;
            context.suffix = Some(reason);
            let report = self.noop_report(run_id, symbol, tf, candle_ts, &intent, context);
            return Ok((RunStatus::Noop, report));
        }

        // Pre-gate through risk so a rejection is a NOOP with the decision
        // payload instead of a REJECTED order row.
        let stop_distance = intent
            .risk_hints
            .stop_loss_price
            .map(|stop| (candle.open - stop).abs() / self.config.execution.pip_size);
        let decision = self
            .risk
            .check_order(conn, symbol, side, requested_qty, stop_distance, candle_ts)
            .await?;
        let risk_json = serde_json::to_value(&decision)
            .map_err(|e| EngineError::validation(format!("risk encode failed: {e}")))?;

        if !decision.allowed || decision.approved_qty <= Decimal::ZERO {
            let mut context = NoopContext::default();
            context.intent_json = intent_json;
            context.account_json = account_json;
            context.risk_json = Some(risk_json);
            context.suffix = Some("risk_rejected".to_string());
            let report = self.noop_report(run_id, symbol, tf, candle_ts, &intent, context);
            return Ok((RunStatus::Noop, report));
        }

        let plan = OrderPlan {
            symbol: symbol.to_string(),
            side,
            qty: decision.approved_qty,
            stop_loss: intent.risk_hints.stop_loss_price,
            take_profit: intent.risk_hints.take_profit_price,
            reason: format!("cycle_{}", intent.reason),
        };

        let outcome = self
            .oms
            .place(
                conn,
                &PlaceOrderRequest {
                    symbol: plan.symbol.clone(),
                    side: plan.side,
                    qty: plan.qty,
                    stop_loss: plan.stop_loss,
                    take_profit: plan.take_profit,
                    reason: Some(plan.reason.clone()),
                    idempotency_key: Some(Self::order_idempotency_key(
                        symbol,
                        tf.as_str(),
                        candle_ts,
                        side,
                    )),
                },
            )
            .await?;

        let order_json = serde_json::to_value(&outcome.order)
            .map_err(|e| EngineError::validation(format!("order encode failed: {e}")))?;
        let fill_json = outcome
            .fill
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| EngineError::validation(format!("fill encode failed: {e}")))?;

        if outcome.order.parsed_status() == Some(OrderStatus::Rejected) {
            let mut context = NoopContext::default();
            context.intent_json = intent_json;
            context.account_json = account_json;
            context.risk_json = Some(risk_json);
            context.order_json = Some(order_json);
            context.suffix = Some("order_rejected".to_string());
            let report = self.noop_report(run_id, symbol, tf, candle_ts, &intent, context);
            return Ok((RunStatus::Noop, report));
        }

        // Accounting already ran inside OMS place when a fill was produced;
        // refresh the persisted views for the report.
        let position = PositionRepository::get(&mut *conn, ACCOUNT_ID, symbol).await?;
        let positions_json = json!({ "position": position });
        if let Some(fill) = &outcome.fill {
            let snapshot = self
                .accounting
                .process_accounting_for_candle(conn, symbol, tf.as_str(), fill.ts)
                .await?;
            account_json = serde_json::to_value(&snapshot)
                .map_err(|e| EngineError::validation(format!("account encode failed: {e}")))?;
        }

        let fill_price = outcome.fill.as_ref().map(|f| f.price);
        let summary = format!(
            "{symbol} {} {} => {} ({}), qty={}, fill={}, order_status={}",
            tf.as_str(),
            candle_ts.to_rfc3339(),
            intent.action.as_str(),
            intent.reason,
            plan.qty,
            fill_price.map_or_else(|| "pending".to_string(), |p| p.to_string()),
            outcome.order.status,
        );

        let report = NewRunReport {
            intent_json: Some(intent_json),
            risk_json: Some(risk_json),
            order_json: Some(order_json),
            fill_json,
            positions_json: Some(positions_json),
            account_json: Some(account_json),
            summary_text: summary.clone(),
            telegram_text: Self::telegram_text(
                run_id,
                RunStatus::Ok,
                symbol,
                tf.as_str(),
                candle_ts,
                &summary,
            ),
            error_text: None,
            mode: "execute".to_string(),
        };
        Ok((RunStatus::Ok, report))
    }

    async fn cooldown_block(
        &self,
        conn: &mut PgConnection,
        symbol: &str,
        tf: Timeframe,
        candle_ts: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let cooldown = self.config.strategy.cooldown_candles;
        if cooldown <= 0 {
            return Ok(None);
        }
        let Some(last_ts) = OrderRepository::latest_order_ts(&mut *conn, symbol).await? else {
            return Ok(None);
        };
        let window = tf.duration() * cooldown as i32;
        if candle_ts - last_ts < window {
            return Ok(Some(format!("cooldown_until_{}", (last_ts + window).to_rfc3339())));
        }
        Ok(None)
    }

    fn noop_report(
        &self,
        run_id: Uuid,
        symbol: &str,
        tf: Timeframe,
        candle_ts: DateTime<Utc>,
        intent: &StrategyIntent,
        context: NoopContext,
    ) -> NewRunReport {
        let summary = match &context.suffix {
            Some(suffix) => format!("{} => NOOP ({suffix})", intent.summary),
            None => intent.summary.clone(),
        };
        NewRunReport {
            intent_json: Some(context.intent_json),
            risk_json: context.risk_json,
            order_json: context.order_json,
            fill_json: None,
            positions_json: None,
            account_json: Some(context.account_json),
            summary_text: summary.clone(),
            telegram_text: Self::telegram_text(
                run_id,
                RunStatus::Noop,
                symbol,
                tf.as_str(),
                candle_ts,
                &summary,
            ),
            error_text: None,
            mode: "execute".to_string(),
        }
    }

    fn telegram_text(
        run_id: Uuid,
        status: RunStatus,
        symbol: &str,
        timeframe: &str,
        candle_ts: DateTime<Utc>,
        summary: &str,
    ) -> String {
        [
            format!("run_id={run_id} status={}", status.as_str()),
            format!("symbol={symbol} timeframe={timeframe}"),
            format!("candle_ts={}", candle_ts.to_rfc3339()),
            format!("summary={summary}"),
        ]
        .join("\n")
    }

    /// Most recent run reports.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn list_runs(&self, pool: &PgPool, limit: i64) -> Result<Vec<RunReportRecord>> {
        RunReportRepository::list(pool, limit).await
    }

    /// Report by run id.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id.
    pub async fn get_run(&self, pool: &PgPool, run_id: Uuid) -> Result<RunReportRecord> {
        RunReportRepository::by_run_id(pool, run_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("run {run_id}")))
    }
}

#[derive(Default)]
struct NoopContext {
    intent_json: serde_json::Value,
    account_json: serde_json::Value,
    risk_json: Option<serde_json::Value>,
    order_json: Option<serde_json::Value>,
    suffix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap()
    }

    #[test]
    fn test_run_id_is_deterministic() {
        let a = OrchestratorService::run_id("EURUSD", "M5", ts());
        let b = OrchestratorService::run_id("EURUSD", "M5", ts());
        assert_eq!(a, b);
    }

    #[test]
    fn test_run_id_varies_by_cycle_key() {
        let base = OrchestratorService::run_id("EURUSD", "M5", ts());
        assert_ne!(base, OrchestratorService::run_id("GBPUSD", "M5", ts()));
        assert_ne!(base, OrchestratorService::run_id("EURUSD", "M1", ts()));
        let later = ts() + Timeframe::M5.duration();
        assert_ne!(base, OrchestratorService::run_id("EURUSD", "M5", later));
    }

    #[test]
    fn test_order_key_includes_side() {
        let buy = OrchestratorService::order_idempotency_key("EURUSD", "M5", ts(), Side::Buy);
        let sell = OrchestratorService::order_idempotency_key("EURUSD", "M5", ts(), Side::Sell);
        assert_ne!(buy, sell);
        // Replays of the same cycle coalesce to the same key.
        assert_eq!(
            buy,
            OrchestratorService::order_idempotency_key("EURUSD", "M5", ts(), Side::Buy)
        );
    }

    #[test]
    fn test_telegram_text_leads_with_run_id_and_status() {
        let run_id = OrchestratorService::run_id("EURUSD", "M5", ts());
        let text = OrchestratorService::telegram_text(
            run_id,
            RunStatus::Ok,
            "EURUSD",
            "M5",
            ts(),
            "cross_up",
        );
        let first_line = text.lines().next().unwrap();
        assert!(first_line.starts_with(&format!("run_id={run_id} status=OK")));
        assert!(text.contains("candle_ts=2024-01-01T00:05:00+00:00"));
    }
}
