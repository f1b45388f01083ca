//! Mark-to-market snapshots, unique per `(account_id, asof_open_time)`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountSnapshotRecord {
    pub id: i64,
    pub account_id: i32,
    pub asof_open_time: DateTime<Utc>,
    pub balance: Decimal,
    pub equity: Decimal,
    pub unrealized_pnl: Decimal,
    pub margin_used: Decimal,
    pub free_margin: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_identities() {
        // equity = balance + unrealized; free_margin = equity - margin_used
        let snap = AccountSnapshotRecord {
            id: 1,
            account_id: 1,
            asof_open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap(),
            balance: dec!(10000),
            equity: dec!(10002),
            unrealized_pnl: dec!(2),
            margin_used: dec!(36.67),
            free_margin: dec!(9965.33),
        };
        assert_eq!(snap.equity, snap.balance + snap.unrealized_pnl);
        assert_eq!(snap.free_margin, snap.equity - snap.margin_used);
    }
}
