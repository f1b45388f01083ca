pub mod account_repo;
pub mod candle_repo;
pub mod fill_repo;
pub mod order_repo;
pub mod position_repo;
pub mod risk_repo;
pub mod run_report_repo;
pub mod snapshot_repo;
pub mod trade_repo;

pub use account_repo::{AccountRepository, ACCOUNT_ID};
pub use candle_repo::CandleRepository;
pub use fill_repo::FillRepository;
pub use order_repo::{OrderFilters, OrderRepository};
pub use position_repo::PositionRepository;
pub use risk_repo::RiskRepository;
pub use run_report_repo::RunReportRepository;
pub use snapshot_repo::SnapshotRepository;
pub use trade_repo::TradeRepository;
