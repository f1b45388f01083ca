//! Fill rows. Exactly one fill per order, enforced by the unique index on
//! `order_id`.

use chrono::{DateTime, Utc};
use fx_paper_core::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FillRecord {
    pub id: i64,
    pub order_id: i64,
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: String,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub slippage: Decimal,
    /// Stamped by accounting when the fill has been netted into the
    /// position; null means not yet consumed.
    pub accounted_at_open_time: Option<DateTime<Utc>>,
}

impl FillRecord {
    /// Returns the parsed fill side.
    #[must_use]
    pub fn parsed_side(&self) -> Option<Side> {
        Side::parse(&self.side)
    }

    /// Signed quantity: positive for BUY fills, negative for SELL fills.
    #[must_use]
    pub fn signed_qty(&self) -> Decimal {
        match self.parsed_side() {
            Some(Side::Sell) => -self.qty,
            _ => self.qty,
        }
    }
}

/// Insert payload for a fill row.
#[derive(Debug, Clone)]
pub struct NewFill {
    pub order_id: i64,
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub slippage: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_qty_by_side() {
        let mut fill = FillRecord {
            id: 1,
            order_id: 1,
            ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap(),
            symbol: "EURUSD".to_string(),
            side: "BUY".to_string(),
            qty: dec!(2),
            price: dec!(1.1001),
            fee: dec!(0),
            slippage: dec!(0.5),
            accounted_at_open_time: None,
        };
        assert_eq!(fill.signed_qty(), dec!(2));

        fill.side = "SELL".to_string();
        assert_eq!(fill.signed_qty(), dec!(-2));
    }
}
