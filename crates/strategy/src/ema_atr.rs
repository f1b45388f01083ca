//! EMA crossover strategy with ATR-derived risk hints.

use fx_paper_core::{EngineError, IntentAction, Result, StrategyConfig};
use fx_paper_data::CandleRecord;
use rust_decimal::Decimal;

use crate::indicators::{atr, ema};
use crate::intent::{StrategyIndicators, StrategyIntent, StrategyRiskHints};
use crate::Strategy;

#[derive(Debug, Clone)]
pub struct EmaAtrParams {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub atr_period: usize,
    pub sl_atr_mult: Decimal,
    pub tp_atr_mult: Decimal,
}

impl EmaAtrParams {
    /// Validates parameter sanity.
    ///
    /// # Errors
    /// Returns a validation error for non-positive periods or multipliers,
    /// or when the fast period is not below the slow one.
    pub fn validated(
        ema_fast_period: usize,
        ema_slow_period: usize,
        atr_period: usize,
        sl_atr_mult: Decimal,
        tp_atr_mult: Decimal,
    ) -> Result<Self> {
        if ema_fast_period == 0 || ema_slow_period == 0 || atr_period == 0 {
            return Err(EngineError::validation("ema/atr periods must be > 0"));
        }
        if ema_fast_period >= ema_slow_period {
            return Err(EngineError::validation(
                "ema_fast_period must be < ema_slow_period",
            ));
        }
        if sl_atr_mult <= Decimal::ZERO || tp_atr_mult <= Decimal::ZERO {
            return Err(EngineError::validation(
                "sl_atr_mult and tp_atr_mult must be > 0",
            ));
        }
        Ok(Self {
            ema_fast_period,
            ema_slow_period,
            atr_period,
            sl_atr_mult,
            tp_atr_mult,
        })
    }

    /// Builds parameters from the strategy config section.
    ///
    /// # Errors
    /// Returns a validation error if the configured values are inconsistent.
    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        Self::validated(
            config.ema_fast_period,
            config.ema_slow_period,
            config.atr_period,
            config.sl_atr_mult,
            config.tp_atr_mult,
        )
    }
}

pub struct EmaAtrStrategy {
    params: EmaAtrParams,
}

impl EmaAtrStrategy {
    pub const NAME: &'static str = "ema_atr";

    #[must_use]
    pub fn new(params: EmaAtrParams) -> Self {
        Self { params }
    }

    fn fmt_price(value: Option<Decimal>) -> String {
        value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.6}"))
    }
}

impl Strategy for EmaAtrStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn minimum_candles(&self) -> usize {
        self.params
            .ema_slow_period
            .max(self.params.atr_period)
            + 1
    }

    fn compute_intent(&self, candles: &[CandleRecord]) -> StrategyIntent {
        let Some(latest) = candles.last() else {
            return StrategyIntent::hold(
                "",
                "",
                None,
                "insufficient_data",
                "no candles => HOLD (insufficient_data)".to_string(),
            );
        };

        let symbol = latest.symbol.to_uppercase();
        let timeframe = latest.timeframe.to_uppercase();
        let ts = latest.open_time;

        if candles.len() < self.minimum_candles() {
            return StrategyIntent::hold(
                &symbol,
                &timeframe,
                Some(ts),
                "insufficient_data",
                format!(
                    "{symbol} {timeframe} candles={} required={} => HOLD (insufficient_data)",
                    candles.len(),
                    self.minimum_candles()
                ),
            );
        }

        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<Decimal> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<Decimal> = candles.iter().map(|c| c.low).collect();

        let ema_fast_series = ema(&closes, self.params.ema_fast_period);
        let ema_slow_series = ema(&closes, self.params.ema_slow_period);
        let atr_series = atr(&highs, &lows, &closes, self.params.atr_period);

        let idx = candles.len() - 1;
        let (Some(ema_fast), Some(ema_slow), Some(atr_now), Some(prev_fast), Some(prev_slow)) = (
            ema_fast_series[idx],
            ema_slow_series[idx],
            atr_series[idx],
            ema_fast_series[idx - 1],
            ema_slow_series[idx - 1],
        ) else {
            return StrategyIntent::hold(
                &symbol,
                &timeframe,
                Some(ts),
                "insufficient_data",
                format!("{symbol} {timeframe} indicator warmup incomplete => HOLD (insufficient_data)"),
            );
        };

        let (action, reason) = if prev_fast <= prev_slow && ema_fast > ema_slow {
            (IntentAction::Buy, "cross_up")
        } else if prev_fast >= prev_slow && ema_fast < ema_slow {
            (IntentAction::Sell, "cross_down")
        } else {
            (IntentAction::Hold, "no_cross")
        };

        let close = closes[idx];
        let (stop_loss, take_profit) = match action {
            IntentAction::Buy => (
                Some(close - atr_now * self.params.sl_atr_mult),
                Some(close + atr_now * self.params.tp_atr_mult),
            ),
            IntentAction::Sell => (
                Some(close + atr_now * self.params.sl_atr_mult),
                Some(close - atr_now * self.params.tp_atr_mult),
            ),
            _ => (None, None),
        };

        let summary = format!(
            "{symbol} {timeframe} ema{}={ema_fast:.6} ema{}={ema_slow:.6} atr={atr_now:.6} => {} ({reason}), SL={}, TP={}",
            self.params.ema_fast_period,
            self.params.ema_slow_period,
            action.as_str(),
            Self::fmt_price(stop_loss),
            Self::fmt_price(take_profit),
        );

        StrategyIntent {
            action,
            reason: reason.to_string(),
            symbol,
            timeframe,
            ts: Some(ts),
            indicators: StrategyIndicators {
                ema_fast: Some(ema_fast),
                ema_slow: Some(ema_slow),
                atr: Some(atr_now),
            },
            risk_hints: StrategyRiskHints {
                stop_loss_price: stop_loss,
                take_profit_price: take_profit,
            },
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
    }

    fn candle(i: u32, close: Decimal) -> CandleRecord {
        CandleRecord {
            id: i64::from(i),
            symbol: "EURUSD".to_string(),
            timeframe: "M5".to_string(),
            open_time: ts(i * 5),
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: Some(dec!(1000)),
            source: "mock".to_string(),
            ingested_at: ts(i * 5),
        }
    }

    fn window(closes: &[Decimal]) -> Vec<CandleRecord> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| candle(i as u32, *c))
            .collect()
    }

    fn small_strategy() -> EmaAtrStrategy {
        EmaAtrStrategy::new(
            EmaAtrParams::validated(2, 3, 2, dec!(1.5), dec!(2.0)).unwrap(),
        )
    }

    #[test]
    fn test_params_reject_fast_not_below_slow() {
        assert!(EmaAtrParams::validated(50, 20, 14, dec!(1.5), dec!(2.0)).is_err());
        assert!(EmaAtrParams::validated(20, 20, 14, dec!(1.5), dec!(2.0)).is_err());
    }

    #[test]
    fn test_params_reject_zero_period() {
        assert!(EmaAtrParams::validated(0, 3, 2, dec!(1.5), dec!(2.0)).is_err());
        assert!(EmaAtrParams::validated(2, 3, 0, dec!(1.5), dec!(2.0)).is_err());
    }

    #[test]
    fn test_short_window_holds_with_insufficient_data() {
        let strategy = small_strategy();
        // minimum is max(3, 2) + 1 = 4
        let intent = strategy.compute_intent(&window(&[dec!(10), dec!(9), dec!(8)]));
        assert_eq!(intent.action, IntentAction::Hold);
        assert_eq!(intent.reason, "insufficient_data");
        assert_eq!(intent.ts, Some(ts(10)));
    }

    #[test]
    fn test_empty_window_holds() {
        let strategy = small_strategy();
        let intent = strategy.compute_intent(&[]);
        assert_eq!(intent.action, IntentAction::Hold);
        assert!(intent.ts.is_none());
    }

    #[test]
    fn test_cross_up_emits_buy_with_atr_hints() {
        let strategy = small_strategy();
        // Closes 10, 9, 8, 20: fast crosses above slow on the last bar;
        // ATR(2) on the last bar is 7.5 (gap bar true range 13 smoothed).
        let intent = strategy.compute_intent(&window(&[dec!(10), dec!(9), dec!(8), dec!(20)]));
        assert_eq!(intent.action, IntentAction::Buy);
        assert_eq!(intent.reason, "cross_up");
        assert_eq!(intent.indicators.atr, Some(dec!(7.5)));
        // SL = 20 - 1.5 * 7.5, TP = 20 + 2 * 7.5
        assert_eq!(intent.risk_hints.stop_loss_price, Some(dec!(8.75)));
        assert_eq!(intent.risk_hints.take_profit_price, Some(dec!(35.0)));
        assert_eq!(intent.ts, Some(ts(15)));
    }

    #[test]
    fn test_cross_down_emits_sell_with_mirrored_hints() {
        let strategy = small_strategy();
        let intent = strategy.compute_intent(&window(&[dec!(10), dec!(11), dec!(12), dec!(2)]));
        assert_eq!(intent.action, IntentAction::Sell);
        assert_eq!(intent.reason, "cross_down");
        let sl = intent.risk_hints.stop_loss_price.unwrap();
        let tp = intent.risk_hints.take_profit_price.unwrap();
        assert!(sl > dec!(2), "short stop sits above entry");
        assert!(tp < dec!(2), "short target sits below entry");
    }

    #[test]
    fn test_no_cross_holds_without_hints() {
        let strategy = small_strategy();
        let intent = strategy.compute_intent(&window(&[dec!(10), dec!(11), dec!(12), dec!(13)]));
        assert_eq!(intent.action, IntentAction::Hold);
        assert_eq!(intent.reason, "no_cross");
        assert!(intent.risk_hints.stop_loss_price.is_none());
        assert!(intent.risk_hints.take_profit_price.is_none());
    }

    #[test]
    fn test_intent_is_deterministic() {
        let strategy = small_strategy();
        let candles = window(&[dec!(10), dec!(9), dec!(8), dec!(20)]);
        let a = strategy.compute_intent(&candles);
        let b = strategy.compute_intent(&candles);
        assert_eq!(a.action, b.action);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.indicators.ema_fast, b.indicators.ema_fast);
    }
}
