//! Pre-trade risk gate: sizing, caps, daily loss, margin.
//!
//! Rejection reasons are stable snake_case tokens stored verbatim on the
//! rejected order row.

use chrono::{DateTime, NaiveDate, Utc};
use fx_paper_core::{
    AppConfig, EngineError, ExecutionConfig, Result, RiskConfig, Side, Timeframe,
};
use fx_paper_accounting::AccountingEngine;
use fx_paper_data::{CandleRepository, PositionRepository, RiskRepository, ACCOUNT_ID};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

pub const REASON_NON_POSITIVE_QTY: &str = "non_positive_qty";
pub const REASON_DAILY_LOSS: &str = "daily_loss_limit_breached";
pub const REASON_MAX_OPEN_POSITIONS: &str = "max_open_positions";
pub const REASON_MAX_OPEN_POSITIONS_PER_SYMBOL: &str = "max_open_positions_per_symbol";
pub const REASON_QTY_ROUNDED_TO_ZERO: &str = "qty_rounded_to_zero";
pub const REASON_MAX_SYMBOL_NOTIONAL: &str = "max_symbol_notional";
pub const REASON_MAX_TOTAL_NOTIONAL: &str = "max_total_notional";
pub const REASON_INSUFFICIENT_FREE_MARGIN: &str = "insufficient_free_margin";

/// Portfolio view at the reference candle used by the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub account_id: i32,
    pub asof_open_time: DateTime<Utc>,
    pub day: NaiveDate,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin_used: Decimal,
    pub free_margin: Decimal,
    pub open_positions_count: i64,
    pub open_positions_per_symbol: i64,
    pub notional_per_symbol: Decimal,
    pub total_notional: Decimal,
    pub day_start_equity: Decimal,
    pub min_equity: Decimal,
    pub daily_loss_breached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub allowed: bool,
    pub approved_qty: Decimal,
    pub reason: Option<String>,
    pub snapshot: Option<RiskSnapshot>,
}

impl RiskDecision {
    fn reject(reason: &str, snapshot: Option<RiskSnapshot>) -> Self {
        Self {
            allowed: false,
            approved_qty: Decimal::ZERO,
            reason: Some(reason.to_string()),
            snapshot,
        }
    }
}

/// Floors a quantity down to the lot step.
#[must_use]
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).floor() * step
}

/// Risk-per-trade sizing: caps the requested quantity at
/// `equity * risk_pct / (pip_size * stop_distance_pips)`, floored to the
/// lot step. Without a stop distance the request passes through.
#[must_use]
pub fn size_for_risk(
    requested_qty: Decimal,
    equity: Decimal,
    risk_per_trade_pct: Decimal,
    pip_size: Decimal,
    stop_distance_pips: Option<Decimal>,
    lot_step: Decimal,
) -> Decimal {
    match stop_distance_pips {
        Some(stop) if stop > Decimal::ZERO && risk_per_trade_pct > Decimal::ZERO => {
            let risk_amount = equity * risk_per_trade_pct;
            let max_units = risk_amount / (pip_size * stop);
            floor_to_step(requested_qty.min(max_units), lot_step)
        }
        _ => floor_to_step(requested_qty, lot_step),
    }
}

/// Daily-loss breach rule. Each limit is active only when positive.
#[must_use]
pub fn daily_loss_breached(
    day_start_equity: Decimal,
    equity: Decimal,
    limit_pct: Decimal,
    limit_amount: Decimal,
) -> bool {
    if limit_pct > Decimal::ZERO && equity <= day_start_equity * (Decimal::ONE - limit_pct) {
        return true;
    }
    if limit_amount > Decimal::ZERO && equity <= day_start_equity - limit_amount {
        return true;
    }
    false
}

pub struct RiskEngine {
    risk: RiskConfig,
    execution: ExecutionConfig,
    timeframe: Timeframe,
    leverage: Decimal,
    accounting: AccountingEngine,
}

impl RiskEngine {
    /// Builds the engine from application config.
    ///
    /// # Errors
    /// Returns a validation error for an unparseable timeframe.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeframe = Timeframe::parse(&config.market_data.timeframe).ok_or_else(|| {
            EngineError::validation(format!(
                "invalid timeframe: {}",
                config.market_data.timeframe
            ))
        })?;
        Ok(Self {
            risk: config.risk.clone(),
            execution: config.execution.clone(),
            timeframe,
            leverage: config.account.leverage,
            accounting: AccountingEngine::new(config.account.clone(), config.execution.clone()),
        })
    }

    /// Computes the portfolio snapshot at `asof`, creating the daily equity
    /// baseline idempotently on first touch of the day.
    ///
    /// # Errors
    /// Returns `DeterministicSafety` when no reference candle exists at or
    /// before `asof`.
    pub async fn compute_snapshot(
        &self,
        conn: &mut PgConnection,
        symbol: &str,
        asof: DateTime<Utc>,
    ) -> Result<RiskSnapshot> {
        let symbol = symbol.to_uppercase();
        let limits =
            RiskRepository::ensure_limits(conn, ACCOUNT_ID, &self.risk, self.leverage).await?;

        let reference = CandleRepository::latest_at_or_before(
            &mut *conn,
            &symbol,
            self.timeframe.as_str(),
            asof,
        )
        .await?
        .ok_or_else(|| {
            EngineError::deterministic_safety(format!(
                "risk checks require a candle at or before {asof} for {symbol}"
            ))
        })?;

        let state = self
            .accounting
            .compute_account_state(conn, &reference)
            .await?;

        let positions = PositionRepository::open_positions(&mut *conn, ACCOUNT_ID).await?;
        let mut total_notional = Decimal::ZERO;
        let mut symbol_notional = Decimal::ZERO;
        let mut per_symbol_count = 0i64;

        for position in &positions {
            let Some(pos_candle) = CandleRepository::latest_at_or_before(
                &mut *conn,
                &position.symbol,
                self.timeframe.as_str(),
                asof,
            )
            .await?
            else {
                continue;
            };
            let notional =
                position.net_qty.abs() * pos_candle.open * self.execution.contract_size;
            total_notional += notional;
            if position.symbol == symbol {
                per_symbol_count += 1;
                symbol_notional += notional;
            }
        }

        let day = reference.open_time.date_naive();
        let daily =
            RiskRepository::ensure_daily_equity(conn, ACCOUNT_ID, day, state.equity).await?;

        let breached = daily_loss_breached(
            daily.day_start_equity,
            state.equity,
            limits.daily_loss_limit_pct,
            limits.daily_loss_limit_amount,
        );

        Ok(RiskSnapshot {
            account_id: ACCOUNT_ID,
            asof_open_time: reference.open_time,
            day,
            balance: state.balance,
            equity: state.equity,
            margin_used: state.margin_used,
            free_margin: state.free_margin,
            open_positions_count: positions.len() as i64,
            open_positions_per_symbol: per_symbol_count,
            notional_per_symbol: symbol_notional,
            total_notional,
            day_start_equity: daily.day_start_equity,
            min_equity: daily.min_equity,
            daily_loss_breached: breached,
        })
    }

    /// Gates a proposed order. Runs inside the caller's transaction so the
    /// decision and the order row commit together.
    ///
    /// # Errors
    /// Returns store errors and `DeterministicSafety` when no reference
    /// candle exists; all risk rejections are carried in the decision, not
    /// as errors.
    pub async fn check_order(
        &self,
        conn: &mut PgConnection,
        symbol: &str,
        _side: Side,
        qty: Decimal,
        stop_distance_pips: Option<Decimal>,
        asof: DateTime<Utc>,
    ) -> Result<RiskDecision> {
        if qty <= Decimal::ZERO {
            return Ok(RiskDecision::reject(REASON_NON_POSITIVE_QTY, None));
        }

        let symbol = symbol.to_uppercase();
        let limits =
            RiskRepository::ensure_limits(conn, ACCOUNT_ID, &self.risk, self.leverage).await?;
        let snapshot = self.compute_snapshot(conn, &symbol, asof).await?;

        if snapshot.daily_loss_breached {
            return Ok(RiskDecision::reject(REASON_DAILY_LOSS, Some(snapshot)));
        }
        if snapshot.open_positions_count >= i64::from(limits.max_open_positions) {
            return Ok(RiskDecision::reject(
                REASON_MAX_OPEN_POSITIONS,
                Some(snapshot),
            ));
        }
        if snapshot.open_positions_per_symbol >= i64::from(limits.max_open_positions_per_symbol) {
            return Ok(RiskDecision::reject(
                REASON_MAX_OPEN_POSITIONS_PER_SYMBOL,
                Some(snapshot),
            ));
        }

        let reference = CandleRepository::latest_at_or_before(
            &mut *conn,
            &symbol,
            self.timeframe.as_str(),
            asof,
        )
        .await?
        .ok_or_else(|| {
            EngineError::deterministic_safety(format!(
                "risk checks require a candle at or before {asof} for {symbol}"
            ))
        })?;
        let mid = reference.open;

        let approved_qty = size_for_risk(
            qty,
            snapshot.equity,
            limits.risk_per_trade_pct,
            self.execution.pip_size,
            stop_distance_pips,
            limits.lot_step,
        );
        if approved_qty <= Decimal::ZERO {
            return Ok(RiskDecision::reject(
                REASON_QTY_ROUNDED_TO_ZERO,
                Some(snapshot),
            ));
        }

        let new_notional = approved_qty.abs() * mid * self.execution.contract_size;
        if snapshot.notional_per_symbol + new_notional > limits.max_symbol_notional {
            return Ok(RiskDecision::reject(
                REASON_MAX_SYMBOL_NOTIONAL,
                Some(snapshot),
            ));
        }
        if snapshot.total_notional + new_notional > limits.max_total_notional {
            return Ok(RiskDecision::reject(
                REASON_MAX_TOTAL_NOTIONAL,
                Some(snapshot),
            ));
        }

        let required_margin = new_notional / limits.leverage;
        if snapshot.free_margin < required_margin {
            return Ok(RiskDecision::reject(
                REASON_INSUFFICIENT_FREE_MARGIN,
                Some(snapshot),
            ));
        }

        tracing::debug!(
            symbol,
            requested = %qty,
            approved = %approved_qty,
            %required_margin,
            "risk check passed"
        );

        Ok(RiskDecision {
            allowed: true,
            approved_qty,
            reason: None,
            snapshot: Some(snapshot),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_floor_to_step() {
        assert_eq!(floor_to_step(dec!(1.234), dec!(0.01)), dec!(1.23));
        assert_eq!(floor_to_step(dec!(1.239), dec!(0.01)), dec!(1.23));
        assert_eq!(floor_to_step(dec!(0.009), dec!(0.01)), dec!(0.00));
        assert_eq!(floor_to_step(dec!(5), dec!(1)), dec!(5));
    }

    #[test]
    fn test_floor_to_step_zero_step_passes_through() {
        assert_eq!(floor_to_step(dec!(1.234), dec!(0)), dec!(1.234));
    }

    #[test]
    fn test_size_for_risk_caps_at_risk_budget() {
        // equity 10000, 1% risk => 100 at stake; stop 50 pips at pip 0.0001
        // => max_units = 100 / 0.005 = 20000, floored to step.
        let approved = size_for_risk(
            dec!(50000),
            dec!(10000),
            dec!(0.01),
            dec!(0.0001),
            Some(dec!(50)),
            dec!(0.01),
        );
        assert_eq!(approved, dec!(20000));
    }

    #[test]
    fn test_size_for_risk_keeps_small_requests() {
        let approved = size_for_risk(
            dec!(1),
            dec!(10000),
            dec!(0.01),
            dec!(0.0001),
            Some(dec!(50)),
            dec!(0.01),
        );
        assert_eq!(approved, dec!(1));
    }

    #[test]
    fn test_size_for_risk_without_stop_passes_through() {
        let approved = size_for_risk(
            dec!(3.456),
            dec!(10000),
            dec!(0.01),
            dec!(0.0001),
            None,
            dec!(0.01),
        );
        assert_eq!(approved, dec!(3.45));
    }

    #[test]
    fn test_size_for_risk_can_round_to_zero() {
        // Tiny equity with a wide stop rounds below one lot step.
        let approved = size_for_risk(
            dec!(1),
            dec!(1),
            dec!(0.0001),
            dec!(0.0001),
            Some(dec!(1000)),
            dec!(0.01),
        );
        assert_eq!(approved, dec!(0));
    }

    #[test]
    fn test_daily_loss_pct_breach() {
        // 5% limit on a 10000 start: breach at or below 9500.
        assert!(daily_loss_breached(dec!(10000), dec!(9500), dec!(0.05), dec!(0)));
        assert!(!daily_loss_breached(dec!(10000), dec!(9501), dec!(0.05), dec!(0)));
    }

    #[test]
    fn test_daily_loss_amount_breach() {
        assert!(daily_loss_breached(dec!(10000), dec!(9800), dec!(0), dec!(200)));
        assert!(!daily_loss_breached(dec!(10000), dec!(9801), dec!(0), dec!(200)));
    }

    #[test]
    fn test_daily_loss_disabled_limits_never_breach() {
        assert!(!daily_loss_breached(dec!(10000), dec!(1), dec!(0), dec!(0)));
    }

    #[test]
    fn test_reason_tokens_are_stable() {
        // These strings land verbatim on rejected orders; renaming them is
        // a breaking change for downstream automation.
        assert_eq!(REASON_MAX_OPEN_POSITIONS_PER_SYMBOL, "max_open_positions_per_symbol");
        assert_eq!(REASON_DAILY_LOSS, "daily_loss_limit_breached");
        assert_eq!(REASON_INSUFFICIENT_FREE_MARGIN, "insufficient_free_margin");
    }
}
