pub mod netting;
pub mod service;

pub use netting::{apply_fill, ClosedLot, FillTransition, PositionState};
pub use service::{position_margin, unrealized_pnl, AccountState, AccountingEngine, ApplyResult};
