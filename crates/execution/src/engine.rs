//! Deterministic next-open fill engine.
//!
//! An order placed during candle `t` fills only at the open of the first
//! candle with `open_time > t`. One fill per order, enforced twice: by the
//! scan (an existing fill short-circuits) and by the unique index on
//! `fills.order_id`.

use chrono::{DateTime, Utc};
use fx_paper_core::{EngineError, ExecutionConfig, OrderStatus, Result, Side};
use fx_paper_data::{
    CandleRepository, FillRecord, FillRepository, NewFill, OrderRecord, OrderRepository,
};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::pricing::PricingModel;

/// Eligibility of a NEW order against a specific fill candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextOpenDecision {
    /// The fill candle is this order's next-open candle: fill now.
    Fill,
    /// The order's next-open candle exists but is not the fill candle, or
    /// no candle after the order exists yet. Leave NEW for a later call.
    NotDue,
}

/// Pure next-open rule: an order placed at `order_ts` is due exactly when
/// the first candle after it is the fill candle.
#[must_use]
pub fn next_open_decision(
    order_ts: DateTime<Utc>,
    next_candle_open: Option<DateTime<Utc>>,
    fill_candle_open: DateTime<Utc>,
) -> NextOpenDecision {
    match next_candle_open {
        Some(next) if next > order_ts && next == fill_candle_open => NextOpenDecision::Fill,
        _ => NextOpenDecision::NotDue,
    }
}

pub struct ExecutionEngine {
    pricing: PricingModel,
    slippage_pips: Decimal,
}

impl ExecutionEngine {
    #[must_use]
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            pricing: PricingModel::from_config(config),
            slippage_pips: config.slippage_pips,
        }
    }

    /// Processes eligible NEW market orders against the candle at
    /// `fill_candle_open_time`, inside the caller's transaction.
    ///
    /// Returns the fills produced or re-observed by this call. Invalid
    /// orders transition to REJECTED with a stable reason; orders whose
    /// next-open candle is not this candle are skipped untouched.
    ///
    /// # Errors
    /// Returns `DeterministicSafety` when the fill candle is absent —
    /// nothing is persisted in that case.
    pub async fn process_new_orders_for_candle(
        &self,
        conn: &mut PgConnection,
        fill_candle_open_time: DateTime<Utc>,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Vec<FillRecord>> {
        let fill_candle =
            CandleRepository::exact(&mut *conn, symbol, timeframe, fill_candle_open_time)
                .await?
                .ok_or_else(|| {
                    EngineError::deterministic_safety(format!(
                        "fill candle {fill_candle_open_time} missing for {symbol}/{timeframe}"
                    ))
                })?;

        let orders = OrderRepository::list_new_market(&mut *conn, symbol).await?;
        let mut fills = Vec::new();

        for order in orders {
            // One fill per order: a retry that crashed between the fill
            // insert and the status update is repaired here.
            if let Some(existing) = FillRepository::by_order_id(&mut *conn, order.id).await? {
                if !order.is_terminal() {
                    OrderRepository::set_status(&mut *conn, order.id, OrderStatus::Filled, None)
                        .await?;
                }
                fills.push(existing);
                continue;
            }

            if order.qty <= Decimal::ZERO {
                OrderRepository::set_status(
                    &mut *conn,
                    order.id,
                    OrderStatus::Rejected,
                    Some("non_positive_qty"),
                )
                .await?;
                continue;
            }
            let Some(side) = order.parsed_side() else {
                OrderRepository::set_status(
                    &mut *conn,
                    order.id,
                    OrderStatus::Rejected,
                    Some("unsupported_side"),
                )
                .await?;
                continue;
            };

            let next =
                CandleRepository::next_after(&mut *conn, symbol, timeframe, order.ts).await?;
            let decision = next_open_decision(
                order.ts,
                next.map(|candle| candle.open_time),
                fill_candle.open_time,
            );
            if decision == NextOpenDecision::NotDue {
                continue;
            }

            let fill = self
                .fill_order(&mut *conn, &order, side, fill_candle.open, fill_candle.open_time)
                .await?;
            fills.push(fill);
        }

        Ok(fills)
    }

    async fn fill_order(
        &self,
        conn: &mut PgConnection,
        order: &OrderRecord,
        side: Side,
        candle_open: Decimal,
        fill_ts: DateTime<Utc>,
    ) -> Result<FillRecord> {
        let price = self.pricing.fill_price(side, candle_open);
        let fill = FillRepository::insert(
            &mut *conn,
            &NewFill {
                order_id: order.id,
                ts: fill_ts,
                symbol: order.symbol.clone(),
                side,
                qty: order.qty,
                price,
                fee: Decimal::ZERO,
                slippage: self.slippage_pips,
            },
        )
        .await?;
        OrderRepository::set_status(&mut *conn, order.id, OrderStatus::Filled, None).await?;

        tracing::info!(
            order_id = order.id,
            symbol = %order.symbol,
            side = side.as_str(),
            qty = %order.qty,
            %price,
            %fill_ts,
            "order filled at next open"
        );

        Ok(fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
    }

    #[test]
    fn test_order_not_due_at_its_own_candle() {
        // Execution at t0 itself: the next candle after the order is t1,
        // which is not the candle being processed.
        let decision = next_open_decision(ts(0), Some(ts(5)), ts(0));
        assert_eq!(decision, NextOpenDecision::NotDue);
    }

    #[test]
    fn test_order_fills_at_first_later_candle() {
        let decision = next_open_decision(ts(0), Some(ts(5)), ts(5));
        assert_eq!(decision, NextOpenDecision::Fill);
    }

    #[test]
    fn test_order_skipped_when_processing_a_later_candle() {
        // The order's next-open candle is 00:05; processing 00:10 must not
        // fill it (that call belongs to the 00:05 invocation).
        let decision = next_open_decision(ts(0), Some(ts(5)), ts(10));
        assert_eq!(decision, NextOpenDecision::NotDue);
    }

    #[test]
    fn test_order_with_no_later_candle_waits() {
        let decision = next_open_decision(ts(0), None, ts(0));
        assert_eq!(decision, NextOpenDecision::NotDue);
    }

    #[test]
    fn test_gap_in_history_fills_at_first_available_candle() {
        // 00:05 missing: the first candle after the order is 00:10 and the
        // order fills there.
        let decision = next_open_decision(ts(0), Some(ts(10)), ts(10));
        assert_eq!(decision, NextOpenDecision::Fill);
    }
}
