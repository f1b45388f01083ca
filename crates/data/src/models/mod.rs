//! Row models for the paper-trading store.
//!
//! All monetary fields use `rust_decimal::Decimal`; models derive
//! `sqlx::FromRow` and serialize for the control surface.

pub mod account;
pub mod candle;
pub mod fill;
pub mod order;
pub mod position;
pub mod risk;
pub mod run_report;
pub mod snapshot;
pub mod trade;

pub use account::AccountRecord;
pub use candle::{CandleRecord, NewCandle};
pub use fill::{FillRecord, NewFill};
pub use order::{NewOrder, OrderRecord};
pub use position::PositionRecord;
pub use risk::{DailyEquityRecord, RiskLimitsRecord};
pub use run_report::{NewRunReport, RunReportRecord};
pub use snapshot::AccountSnapshotRecord;
pub use trade::{NewTrade, TradeRecord};
