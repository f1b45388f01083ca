//! Strategy output types.

use chrono::{DateTime, Utc};
use fx_paper_core::IntentAction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyIndicators {
    pub ema_fast: Option<Decimal>,
    pub ema_slow: Option<Decimal>,
    pub atr: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyRiskHints {
    pub stop_loss_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
}

/// A pure, deterministic map from a candle window to a trading intention.
/// `ts` is the last window candle's `open_time`; the strategy never reads
/// accounts, positions, or orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyIntent {
    pub action: IntentAction,
    pub reason: String,
    pub symbol: String,
    pub timeframe: String,
    pub ts: Option<DateTime<Utc>>,
    pub indicators: StrategyIndicators,
    pub risk_hints: StrategyRiskHints,
    pub summary: String,
}

impl StrategyIntent {
    /// A HOLD intent with the given reason.
    #[must_use]
    pub fn hold(
        symbol: &str,
        timeframe: &str,
        ts: Option<DateTime<Utc>>,
        reason: &str,
        summary: String,
    ) -> Self {
        Self {
            action: IntentAction::Hold,
            reason: reason.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            ts,
            indicators: StrategyIndicators::default(),
            risk_hints: StrategyRiskHints::default(),
            summary,
        }
    }

    /// Appends the data-gap marker to the reason and summary. The intent is
    /// still emitted; callers decide whether to act on gapped data.
    pub fn flag_data_gap(&mut self) {
        self.reason = format!("{},data_gap_detected", self.reason);
        self.summary = format!("{} [data_gap_detected]", self.summary);
    }
}
