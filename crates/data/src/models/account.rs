//! The singleton account row. All balance reads and writes go through the
//! store; there is no process-level account state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountRecord {
    pub id: i32,
    pub balance: Decimal,
    pub currency: String,
    pub leverage: Decimal,
    pub updated_at: DateTime<Utc>,
}
