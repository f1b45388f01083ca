pub mod database;
pub mod models;
pub mod repositories;

pub use database::{connect_pool, run_migrations};
pub use models::{
    AccountRecord, AccountSnapshotRecord, CandleRecord, DailyEquityRecord, FillRecord, NewCandle,
    NewFill, NewOrder, NewRunReport, NewTrade, OrderRecord, PositionRecord, RiskLimitsRecord,
    RunReportRecord, TradeRecord,
};
pub use repositories::{
    AccountRepository, CandleRepository, FillRepository, OrderFilters, OrderRepository,
    PositionRepository, RiskRepository, RunReportRepository, SnapshotRepository, TradeRepository,
    ACCOUNT_ID,
};
