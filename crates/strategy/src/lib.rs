pub mod ema_atr;
pub mod indicators;
pub mod intent;
pub mod runner;

use fx_paper_data::CandleRecord;

pub use ema_atr::{EmaAtrParams, EmaAtrStrategy};
pub use intent::{StrategyIndicators, StrategyIntent, StrategyRiskHints};
pub use runner::{has_gap, StrategyCatalogItem, StrategyRunner};

/// A pure deterministic strategy: a map from a candle window to an intent.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum window length required for a stable signal.
    fn minimum_candles(&self) -> usize;

    /// Computes an intent from deterministic candle history. Must not read
    /// accounts, positions, or orders.
    fn compute_intent(&self, candles: &[CandleRecord]) -> StrategyIntent;
}
