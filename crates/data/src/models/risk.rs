//! Risk persistence rows: per-account limits and the daily equity baseline.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-account risk tuning, seeded lazily from config.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RiskLimitsRecord {
    pub account_id: i32,
    pub max_open_positions: i32,
    pub max_open_positions_per_symbol: i32,
    pub max_total_notional: Decimal,
    pub max_symbol_notional: Decimal,
    pub risk_per_trade_pct: Decimal,
    pub daily_loss_limit_pct: Decimal,
    pub daily_loss_limit_amount: Decimal,
    pub leverage: Decimal,
    pub lot_step: Decimal,
}

/// Daily equity baseline, unique per `(account_id, day)` where the day is
/// the UTC date of the candle `open_time` that first touched it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyEquityRecord {
    pub id: i64,
    pub account_id: i32,
    pub day: NaiveDate,
    pub day_start_equity: Decimal,
    pub min_equity: Decimal,
}
