//! Netting position rows, keyed by `(account_id, symbol)`.
//!
//! The position row is owned by the accounting engine; everything else reads
//! it through queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PositionRecord {
    pub id: i64,
    pub account_id: i32,
    pub symbol: String,
    /// Signed aggregate quantity: positive long, negative short.
    pub net_qty: Decimal,
    pub avg_entry_price: Decimal,
    pub opened_at: Option<DateTime<Utc>>,
    pub updated_open_time: DateTime<Utc>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub realized_pnl_cum: Decimal,
    pub entry_order_id: Option<i64>,
}

impl PositionRecord {
    /// Returns true when a non-zero position is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.net_qty.is_zero()
    }

    /// Returns true for a long (positive) position.
    #[must_use]
    pub fn is_long(&self) -> bool {
        self.net_qty > Decimal::ZERO
    }

    /// Returns true for a short (negative) position.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.net_qty < Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn position(net_qty: Decimal) -> PositionRecord {
        PositionRecord {
            id: 1,
            account_id: 1,
            symbol: "EURUSD".to_string(),
            net_qty,
            avg_entry_price: dec!(1.1),
            opened_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            updated_open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            stop_loss: None,
            take_profit: None,
            realized_pnl_cum: dec!(0),
            entry_order_id: None,
        }
    }

    #[test]
    fn test_direction_helpers() {
        assert!(position(dec!(1)).is_long());
        assert!(position(dec!(-1)).is_short());
        assert!(!position(dec!(0)).is_open());
        assert!(position(dec!(0.5)).is_open());
    }
}
