pub mod service;

pub use service::{
    daily_loss_breached, floor_to_step, size_for_risk, RiskDecision, RiskEngine, RiskSnapshot,
    REASON_DAILY_LOSS, REASON_INSUFFICIENT_FREE_MARGIN, REASON_MAX_OPEN_POSITIONS,
    REASON_MAX_OPEN_POSITIONS_PER_SYMBOL, REASON_MAX_SYMBOL_NOTIONAL, REASON_MAX_TOTAL_NOTIONAL,
    REASON_NON_POSITIVE_QTY, REASON_QTY_ROUNDED_TO_ZERO,
};
