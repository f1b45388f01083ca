//! Order rows and the lifecycle state machine.

use chrono::{DateTime, Utc};
use fx_paper_core::{OrderStatus, OrderType, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A persisted order. `ts` always derives from a candle `open_time`, never
/// from the wall clock.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub order_type: String,
    pub qty: Decimal,
    pub status: String,
    pub reason: Option<String>,
    pub requested_price: Option<Decimal>,
    pub idempotency_key: Option<String>,
}

impl OrderRecord {
    /// Returns the parsed order side.
    #[must_use]
    pub fn parsed_side(&self) -> Option<Side> {
        Side::parse(&self.side)
    }

    /// Returns the parsed lifecycle status.
    #[must_use]
    pub fn parsed_status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }

    /// Returns the parsed order type.
    #[must_use]
    pub fn parsed_type(&self) -> Option<OrderType> {
        OrderType::parse(&self.order_type)
    }

    /// Returns true while the order is still NEW.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.parsed_status() == Some(OrderStatus::New)
    }

    /// Returns true once the order reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.parsed_status().is_some_and(|s| s.is_terminal())
    }
}

/// Insert payload for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub requested_price: Option<Decimal>,
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_order(status: &str) -> OrderRecord {
        OrderRecord {
            id: 1,
            ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            symbol: "EURUSD".to_string(),
            side: "BUY".to_string(),
            order_type: "market".to_string(),
            qty: dec!(1),
            status: status.to_string(),
            reason: None,
            requested_price: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_parsed_helpers() {
        let order = sample_order("NEW");
        assert_eq!(order.parsed_side(), Some(Side::Buy));
        assert_eq!(order.parsed_type(), Some(OrderType::Market));
        assert!(order.is_new());
        assert!(!order.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        for status in ["FILLED", "REJECTED", "CANCELED"] {
            let order = sample_order(status);
            assert!(order.is_terminal(), "{status} should be terminal");
            assert!(!order.is_new());
        }
    }
}
