//! Closed-lot trade rows, append-only.

use chrono::{DateTime, Utc};
use fx_paper_core::ExitReason;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TradeRecord {
    pub id: i64,
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub symbol: String,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub exit_reason: Option<String>,
    pub entry_order_id: Option<i64>,
    pub exit_order_id: Option<i64>,
}

impl TradeRecord {
    /// Returns the parsed exit reason.
    #[must_use]
    pub fn parsed_exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason.as_deref().and_then(ExitReason::parse)
    }
}

/// Insert payload for a closed lot.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub symbol: String,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub exit_reason: ExitReason,
    pub entry_order_id: Option<i64>,
    pub exit_order_id: Option<i64>,
}
