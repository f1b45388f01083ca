//! Strategy catalog and candle-window loading.

use chrono::{DateTime, Utc};
use fx_paper_core::{EngineError, Result, StrategyConfig, Timeframe};
use fx_paper_data::{CandleRecord, CandleRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgExecutor;

use crate::ema_atr::{EmaAtrParams, EmaAtrStrategy};
use crate::intent::StrategyIntent;
use crate::Strategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCatalogItem {
    pub strategy: String,
    pub default_params: serde_json::Value,
}

pub struct StrategyRunner {
    config: StrategyConfig,
}

impl StrategyRunner {
    #[must_use]
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Lists available strategies with their default parameters.
    #[must_use]
    pub fn catalog(&self) -> Vec<StrategyCatalogItem> {
        vec![StrategyCatalogItem {
            strategy: EmaAtrStrategy::NAME.to_string(),
            default_params: json!({
                "ema_fast_period": self.config.ema_fast_period,
                "ema_slow_period": self.config.ema_slow_period,
                "atr_period": self.config.atr_period,
                "sl_atr_mult": self.config.sl_atr_mult,
                "tp_atr_mult": self.config.tp_atr_mult,
            }),
        }]
    }

    /// Instantiates a strategy by name with the configured parameters.
    ///
    /// # Errors
    /// Returns a validation error for an unknown name or bad parameters.
    pub fn create(&self, name: &str) -> Result<Box<dyn Strategy>> {
        match name.to_lowercase().as_str() {
            EmaAtrStrategy::NAME => Ok(Box::new(EmaAtrStrategy::new(EmaAtrParams::from_config(
                &self.config,
            )?))),
            other => Err(EngineError::validation(format!("unknown strategy: {other}"))),
        }
    }

    /// Computes the intent on the window ending at `candle_ts`, flagging a
    /// data gap when the window's `open_time` spacing is uneven.
    ///
    /// # Errors
    /// Returns store errors from the window query or validation errors from
    /// strategy construction.
    pub async fn intent_at(
        &self,
        executor: impl PgExecutor<'_>,
        strategy_name: &str,
        symbol: &str,
        timeframe: Timeframe,
        candle_ts: DateTime<Utc>,
    ) -> Result<StrategyIntent> {
        let strategy = self.create(strategy_name)?;
        let window = CandleRepository::recent_up_to(
            executor,
            symbol,
            timeframe.as_str(),
            candle_ts,
            self.config.warmup_limit,
        )
        .await?;

        let mut intent = strategy.compute_intent(&window);
        if has_gap(&window, timeframe) {
            intent.flag_data_gap();
        }
        Ok(intent)
    }
}

/// True when consecutive window candles are not exactly one timeframe step
/// apart.
#[must_use]
pub fn has_gap(candles: &[CandleRecord], timeframe: Timeframe) -> bool {
    candles
        .windows(2)
        .any(|pair| pair[1].open_time - pair[0].open_time != timeframe.duration())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(minute: u32) -> CandleRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
        CandleRecord {
            id: i64::from(minute),
            symbol: "EURUSD".to_string(),
            timeframe: "M5".to_string(),
            open_time: ts,
            open: dec!(1.08),
            high: dec!(1.081),
            low: dec!(1.079),
            close: dec!(1.08),
            volume: None,
            source: "mock".to_string(),
            ingested_at: ts,
        }
    }

    #[test]
    fn test_contiguous_window_has_no_gap() {
        let window = vec![candle(0), candle(5), candle(10)];
        assert!(!has_gap(&window, Timeframe::M5));
    }

    #[test]
    fn test_missing_slot_is_a_gap() {
        let window = vec![candle(0), candle(5), candle(15)];
        assert!(has_gap(&window, Timeframe::M5));
    }

    #[test]
    fn test_single_candle_has_no_gap() {
        assert!(!has_gap(&[candle(0)], Timeframe::M5));
        assert!(!has_gap(&[], Timeframe::M5));
    }

    #[test]
    fn test_catalog_lists_ema_atr() {
        let runner = StrategyRunner::new(StrategyConfig::default());
        let catalog = runner.catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].strategy, "ema_atr");
        assert_eq!(catalog[0].default_params["ema_fast_period"], 20);
    }

    #[test]
    fn test_create_rejects_unknown_strategy() {
        let runner = StrategyRunner::new(StrategyConfig::default());
        assert!(runner.create("martingale").is_err());
        assert!(runner.create("ema_atr").is_ok());
    }
}
