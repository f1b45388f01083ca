//! Shared domain enums and the timeframe grid.
//!
//! Persisted enums are stored as their `as_str()` text and parsed back with
//! `parse()`, so the database stays readable and the Rust side stays typed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy (long).
    Buy,
    /// Sell (short).
    Sell,
}

impl Side {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Applies the side's sign to an unsigned quantity.
    #[must_use]
    pub fn signed_qty(&self, qty: Decimal) -> Decimal {
        match self {
            Self::Buy => qty,
            Self::Sell => -qty,
        }
    }
}

/// Order lifecycle status. NEW transitions to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Filled,
    Rejected,
    Canceled,
}

impl OrderStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Filled => "FILLED",
            Self::Rejected => "REJECTED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NEW" => Some(Self::New),
            "FILLED" => Some(Self::Filled),
            "REJECTED" => Some(Self::Rejected),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Returns true for FILLED, REJECTED, and CANCELED.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::New)
    }
}

/// Order type. Only market orders are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
}

impl OrderType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "market" => Some(Self::Market),
            _ => None,
        }
    }
}

/// Action emitted by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentAction {
    Buy,
    Sell,
    Hold,
    Close,
}

impl IntentAction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::Close => "CLOSE",
        }
    }

    /// Returns the order side for directional actions, None otherwise.
    #[must_use]
    pub const fn side(&self) -> Option<Side> {
        match self {
            Self::Buy => Some(Side::Buy),
            Self::Sell => Some(Side::Sell),
            Self::Hold | Self::Close => None,
        }
    }
}

/// Reason a trade lot was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Manual,
    Flip,
}

impl ExitReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "SL",
            Self::TakeProfit => "TP",
            Self::Manual => "MANUAL",
            Self::Flip => "FLIP",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SL" => Some(Self::StopLoss),
            "TP" => Some(Self::TakeProfit),
            "MANUAL" => Some(Self::Manual),
            "FLIP" => Some(Self::Flip),
            _ => None,
        }
    }
}

/// Outcome of one orchestrator cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Ok,
    Noop,
    Error,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Noop => "NOOP",
            Self::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NOOP" => Some(Self::Noop),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Candle interval. The grid is continuous: exchange sessions are not
/// modeled, and every slot between two aligned timestamps is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Grid anchor. Every aligned `open_time` is a whole number of slots
    /// after this instant.
    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "M1",
            Self::M5 => "M5",
            Self::M15 => "M15",
            Self::M30 => "M30",
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::D1 => "D1",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "M1" => Some(Self::M1),
            "M5" => Some(Self::M5),
            "M15" => Some(Self::M15),
            "M30" => Some(Self::M30),
            "H1" => Some(Self::H1),
            "H4" => Some(Self::H4),
            "D1" => Some(Self::D1),
            _ => None,
        }
    }

    /// Interval length in minutes.
    #[must_use]
    pub const fn minutes(&self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1440,
        }
    }

    /// Interval length as a chrono duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Floors a timestamp to the timeframe grid.
    #[must_use]
    pub fn align_floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.minutes() * 60;
        let offset = (ts - Self::epoch()).num_seconds();
        Self::epoch() + Duration::seconds(offset.div_euclid(step) * step)
    }

    /// Returns true if the timestamp lies exactly on the grid.
    #[must_use]
    pub fn is_aligned(&self, ts: DateTime<Utc>) -> bool {
        self.align_floor(ts) == ts
    }

    /// Number of grid slots in the closed interval `[start, end]`, after
    /// aligning both ends to the grid.
    #[must_use]
    pub fn slots_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let start = self.align_floor(start);
        let end = self.align_floor(end);
        if end < start {
            return 0;
        }
        (end - start).num_minutes() / self.minutes() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_roundtrip() {
        assert_eq!(Side::parse("buy"), Some(Side::Buy));
        assert_eq!(Side::parse("SELL"), Some(Side::Sell));
        assert_eq!(Side::parse("hold"), None);
        assert_eq!(Side::Buy.as_str(), "BUY");
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn test_side_signed_qty() {
        assert_eq!(Side::Buy.signed_qty(dec!(2)), dec!(2));
        assert_eq!(Side::Sell.signed_qty(dec!(2)), dec!(-2));
    }

    #[test]
    fn test_order_status_terminality() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_order_status_parse_case_insensitive() {
        assert_eq!(OrderStatus::parse("filled"), Some(OrderStatus::Filled));
        assert_eq!(OrderStatus::parse("New"), Some(OrderStatus::New));
        assert_eq!(OrderStatus::parse("unknown"), None);
    }

    #[test]
    fn test_intent_action_side() {
        assert_eq!(IntentAction::Buy.side(), Some(Side::Buy));
        assert_eq!(IntentAction::Sell.side(), Some(Side::Sell));
        assert_eq!(IntentAction::Hold.side(), None);
        assert_eq!(IntentAction::Close.side(), None);
    }

    #[test]
    fn test_timeframe_minutes() {
        assert_eq!(Timeframe::M5.minutes(), 5);
        assert_eq!(Timeframe::H4.minutes(), 240);
        assert_eq!(Timeframe::D1.minutes(), 1440);
    }

    #[test]
    fn test_timeframe_align_floor() {
        let tf = Timeframe::M5;
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 7, 30).unwrap();
        let aligned = tf.align_floor(ts);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap());
        assert!(tf.is_aligned(aligned));
        assert!(!tf.is_aligned(ts));
    }

    #[test]
    fn test_timeframe_align_is_idempotent() {
        let tf = Timeframe::H1;
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap();
        assert_eq!(tf.align_floor(ts), ts);
    }

    #[test]
    fn test_slots_between_inclusive() {
        let tf = Timeframe::M5;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 20, 0).unwrap();
        // 00:00, 00:05, 00:10, 00:15, 00:20
        assert_eq!(tf.slots_between(start, end), 5);
        assert_eq!(tf.slots_between(start, start), 1);
        assert_eq!(tf.slots_between(end, start), 0);
    }

    #[test]
    fn test_run_status_serde_uppercase() {
        let json = serde_json::to_string(&RunStatus::Noop).unwrap();
        assert_eq!(json, "\"NOOP\"");
    }

    #[test]
    fn test_exit_reason_strings() {
        assert_eq!(ExitReason::StopLoss.as_str(), "SL");
        assert_eq!(ExitReason::Flip.as_str(), "FLIP");
        assert_eq!(ExitReason::parse("manual"), Some(ExitReason::Manual));
    }
}
