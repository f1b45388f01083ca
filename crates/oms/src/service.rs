//! Order management: place, list, get, cancel.
//!
//! `place` runs in the caller's transaction: order creation plus risk
//! rejection, or order creation plus execution and accounting, commit
//! together. A restart mid-place leaves either the NEW order (picked up by
//! the next cycle) or nothing.

use chrono::{DateTime, Utc};
use fx_paper_accounting::AccountingEngine;
use fx_paper_core::{
    AppConfig, EngineError, OmsConfig, OrderStatus, Result, Side, Timeframe,
};
use fx_paper_data::{
    CandleRepository, FillRecord, FillRepository, NewOrder, OrderFilters, OrderRecord,
    OrderRepository, PositionRepository, ACCOUNT_ID,
};
use fx_paper_execution::{ExecutionEngine, PricingModel};
use fx_paper_risk::{RiskDecision, RiskEngine};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

pub const REASON_SYMBOL_NOT_ALLOWED: &str = "symbol_not_allowed";
pub const REASON_QTY_BELOW_MIN: &str = "qty_below_min";

/// A market-order placement request. Only market orders exist; limit and
/// stop types are out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Placement outcome: the persisted order plus its fill when execution ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderOutcome {
    pub order: OrderRecord,
    pub fill: Option<FillRecord>,
    pub risk: Option<RiskDecision>,
}

pub struct OmsService {
    oms: OmsConfig,
    timeframe: Timeframe,
    default_symbol: String,
    pricing: PricingModel,
    risk: RiskEngine,
    execution: ExecutionEngine,
    accounting: AccountingEngine,
}

impl OmsService {
    /// Builds the service from application config.
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
            oms: config.oms.clone(),
            timeframe,
            default_symbol: config.market_data.symbol.to_uppercase(),
            pricing: PricingModel::from_config(&config.execution),
            risk: RiskEngine::from_config(config)?,
            execution: ExecutionEngine::new(&config.execution),
            accounting: AccountingEngine::new(config.account.clone(), config.execution.clone()),
        })
    }

    /// Places a market order.
    ///
    /// Validation runs first (a failure is persisted
    /// as a REJECTED order and returned, not thrown), then idempotency-key
    /// replay, then reference-candle resolution. A replay returns the prior
    /// order unchanged; a replay with a different symbol or side raises
    /// `IdempotencyConflict`.
    ///
    /// # Errors
    /// `DeterministicSafety` when no reference candle exists for the order
    /// (nothing is written), `IdempotencyConflict` on a mismatched replay,
    /// and store errors.
    pub async fn place(
        &self,
        conn: &mut PgConnection,
        request: &PlaceOrderRequest,
    ) -> Result<PlaceOrderOutcome> {
        let symbol = request.symbol.to_uppercase();

        if let Some(reason) = self.validate(&symbol, request.qty) {
            // A replayed invalid request still coalesces onto the order the
            // key already produced instead of inserting a duplicate.
            if let Some(outcome) = self.replay_existing(conn, request, &symbol).await? {
                return Ok(outcome);
            }
            let ts = self.rejection_ts(conn, &symbol).await?;
            let order = self
                .persist_rejected(conn, request, &symbol, ts, reason)
                .await?;
            return Ok(PlaceOrderOutcome {
                order,
                fill: None,
                risk: None,
            });
        }

        if let Some(outcome) = self.replay_existing(conn, request, &symbol).await? {
            return Ok(outcome);
        }

        let candle = CandleRepository::latest(&mut *conn, &symbol, self.timeframe.as_str())
            .await?
            .ok_or_else(|| {
                EngineError::deterministic_safety(format!(
                    "order placement requires a stored candle for {symbol}/{}",
                    self.timeframe.as_str()
                ))
            })?;

        let expected_fill_price = self.pricing.fill_price(request.side, candle.open);
        let stop_distance_pips = request
            .stop_loss
            .map(|stop| self.pricing.pips_between(expected_fill_price, stop));

        let decision = self
            .risk
            .check_order(
                conn,
                &symbol,
                request.side,
                request.qty,
                stop_distance_pips,
                candle.open_time,
            )
            .await?;

        if !decision.allowed {
            let reason = decision.reason.clone().unwrap_or_else(|| "risk_rejected".into());
            let order = self
                .persist_rejected(conn, request, &symbol, candle.open_time, &reason)
                .await?;
            return Ok(PlaceOrderOutcome {
                order,
                fill: None,
                risk: Some(decision),
            });
        }

        let order = OrderRepository::insert(
            &mut *conn,
            &NewOrder {
                ts: candle.open_time,
                symbol: symbol.clone(),
                side: request.side,
                qty: decision.approved_qty,
                status: OrderStatus::New,
                reason: request.reason.clone(),
                requested_price: Some(expected_fill_price),
                idempotency_key: request.idempotency_key.clone(),
            },
        )
        .await?;

        // Next-open rule: execute immediately only when the fill candle is
        // already stored (backfilled history); otherwise the order rests
        // NEW until a later cycle observes the next candle.
        let fill = self.try_execute(conn, &order, &symbol, request).await?;

        let order = OrderRepository::by_id(&mut *conn, order.id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {}", order.id)))?;

        Ok(PlaceOrderOutcome {
            order,
            fill,
            risk: Some(decision),
        })
    }

    /// Idempotency replay: the outcome already produced by the request's
    /// key, if any. A key reused with a different symbol or side is a
    /// conflict.
    async fn replay_existing(
        &self,
        conn: &mut PgConnection,
        request: &PlaceOrderRequest,
        symbol: &str,
    ) -> Result<Option<PlaceOrderOutcome>> {
        let Some(key) = &request.idempotency_key else {
            return Ok(None);
        };
        let Some(existing) = OrderRepository::by_idempotency_key(&mut *conn, key).await? else {
            return Ok(None);
        };
        if existing.symbol != symbol || existing.side != request.side.as_str() {
            return Err(EngineError::idempotency_conflict(format!(
                "key {key} was used for {} {} but replayed with {} {}",
                existing.side,
                existing.symbol,
                request.side.as_str(),
                symbol
            )));
        }
        let fill = FillRepository::by_order_id(&mut *conn, existing.id).await?;
        Ok(Some(PlaceOrderOutcome {
            order: existing,
            fill,
            risk: None,
        }))
    }

    /// Candle time to stamp on a rejected order. A disallowed symbol has
    /// no history of its own, so the configured instrument's latest candle
    /// anchors the timestamp.
    async fn rejection_ts(
        &self,
        conn: &mut PgConnection,
        symbol: &str,
    ) -> Result<DateTime<Utc>> {
        if let Some(candle) =
            CandleRepository::latest(&mut *conn, symbol, self.timeframe.as_str()).await?
        {
            return Ok(candle.open_time);
        }
        CandleRepository::latest(&mut *conn, &self.default_symbol, self.timeframe.as_str())
            .await?
            .map(|candle| candle.open_time)
            .ok_or_else(|| {
                EngineError::deterministic_safety(format!(
                    "order rejection requires a stored candle for {}/{}",
                    self.default_symbol,
                    self.timeframe.as_str()
                ))
            })
    }

    async fn try_execute(
        &self,
        conn: &mut PgConnection,
        order: &OrderRecord,
        symbol: &str,
        request: &PlaceOrderRequest,
    ) -> Result<Option<FillRecord>> {
        let Some(next) =
            CandleRepository::next_after(&mut *conn, symbol, self.timeframe.as_str(), order.ts)
                .await?
        else {
            return Ok(None);
        };

        self.execution
            .process_new_orders_for_candle(conn, next.open_time, symbol, self.timeframe.as_str())
            .await?;

        let fill = FillRepository::by_order_id(&mut *conn, order.id).await?;
        if let Some(fill) = &fill {
            self.accounting
                .process_accounting_for_candle(conn, symbol, self.timeframe.as_str(), fill.ts)
                .await?;
            PositionRepository::set_hints(
                &mut *conn,
                ACCOUNT_ID,
                symbol,
                request.stop_loss,
                request.take_profit,
            )
            .await?;
        }
        Ok(fill)
    }

    fn validate(&self, symbol: &str, qty: Decimal) -> Option<&'static str> {
        if !self.oms.allowed_symbols.iter().any(|s| s == symbol) {
            return Some(REASON_SYMBOL_NOT_ALLOWED);
        }
        if qty < self.oms.min_qty {
            return Some(REASON_QTY_BELOW_MIN);
        }
        None
    }

    async fn persist_rejected(
        &self,
        conn: &mut PgConnection,
        request: &PlaceOrderRequest,
        symbol: &str,
        ts: DateTime<Utc>,
        reason: &str,
    ) -> Result<OrderRecord> {
        tracing::info!(symbol, reason, "order rejected");
        OrderRepository::insert(
            conn,
            &NewOrder {
                ts,
                symbol: symbol.to_string(),
                side: request.side,
                qty: request.qty,
                status: OrderStatus::Rejected,
                reason: Some(reason.to_string()),
                requested_price: None,
                idempotency_key: request.idempotency_key.clone(),
            },
        )
        .await
    }

    /// Lists orders with optional filters.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn list(
        &self,
        conn: &mut PgConnection,
        filters: &OrderFilters,
    ) -> Result<Vec<OrderRecord>> {
        OrderRepository::list(&mut *conn, filters).await
    }

    /// Fetches an order and its fill.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id.
    pub async fn get(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<(OrderRecord, Option<FillRecord>)> {
        let order = OrderRepository::by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {id}")))?;
        let fill = FillRepository::by_order_id(&mut *conn, id).await?;
        Ok((order, fill))
    }

    /// Cancels a NEW order. Terminal orders cannot be canceled.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `InvalidStateTransition` when the
    /// order is not NEW.
    pub async fn cancel(&self, conn: &mut PgConnection, id: i64) -> Result<OrderRecord> {
        let order = OrderRepository::by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {id}")))?;

        if !order.is_new() {
            return Err(EngineError::invalid_transition(format!(
                "order {id} is {} and cannot be canceled",
                order.status
            )));
        }

        OrderRepository::set_status(&mut *conn, id, OrderStatus::Canceled, Some("canceled_by_user"))
            .await?;
        let order = OrderRepository::by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("order {id}")))?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx_paper_core::AppConfig;
    use rust_decimal_macros::dec;

    fn service() -> OmsService {
        OmsService::from_config(&AppConfig::default()).unwrap()
    }

    #[test]
    fn test_validate_rejects_symbol_outside_allow_list() {
        let service = service();
        assert_eq!(
            service.validate("GBPJPY", dec!(1)),
            Some(REASON_SYMBOL_NOT_ALLOWED)
        );
        assert_eq!(service.validate("EURUSD", dec!(1)), None);
    }

    #[test]
    fn test_validate_rejects_dust_qty() {
        let service = service();
        assert_eq!(
            service.validate("EURUSD", dec!(0.001)),
            Some(REASON_QTY_BELOW_MIN)
        );
        assert_eq!(service.validate("EURUSD", dec!(0.01)), None);
    }

    #[test]
    fn test_from_config_rejects_bad_timeframe() {
        let mut config = AppConfig::default();
        config.market_data.timeframe = "M7".to_string();
        assert!(OmsService::from_config(&config).is_err());
    }
}
