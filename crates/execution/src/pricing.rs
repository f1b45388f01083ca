//! Deterministic bid/ask and slippage derivation.
//!
//! All prices derive from the candle open. No randomness, no dependence on
//! quantity or wall-clock time.

use fx_paper_core::{ExecutionConfig, Side};
use rust_decimal::Decimal;

/// A two-sided quote around a candle open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricingModel {
    spread_pips: Decimal,
    slippage_pips: Decimal,
    pip_size: Decimal,
}

impl PricingModel {
    #[must_use]
    pub fn new(spread_pips: Decimal, slippage_pips: Decimal, pip_size: Decimal) -> Self {
        Self {
            spread_pips,
            slippage_pips,
            pip_size,
        }
    }

    #[must_use]
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.spread_pips, config.slippage_pips, config.pip_size)
    }

    /// Derives bid/ask around `mid = candle.open`.
    #[must_use]
    pub fn quote(&self, candle_open: Decimal) -> Quote {
        let half_spread = self.spread_pips * self.pip_size / Decimal::TWO;
        Quote {
            bid: candle_open - half_spread,
            ask: candle_open + half_spread,
            mid: candle_open,
        }
    }

    /// Execution price including slippage: BUY pays above the ask, SELL
    /// receives below the bid.
    #[must_use]
    pub fn fill_price(&self, side: Side, candle_open: Decimal) -> Decimal {
        let quote = self.quote(candle_open);
        let slip = self.slippage_pips * self.pip_size;
        match side {
            Side::Buy => quote.ask + slip,
            Side::Sell => quote.bid - slip,
        }
    }

    /// Mark price for open positions: longs are valued on the bid, shorts
    /// on the ask.
    #[must_use]
    pub fn mark_price(&self, net_qty: Decimal, candle_open: Decimal) -> Decimal {
        let quote = self.quote(candle_open);
        if net_qty > Decimal::ZERO {
            quote.bid
        } else {
            quote.ask
        }
    }

    /// Distance between two prices expressed in pips.
    #[must_use]
    pub fn pips_between(&self, a: Decimal, b: Decimal) -> Decimal {
        (a - b).abs() / self.pip_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn model() -> PricingModel {
        PricingModel::new(dec!(1.0), dec!(0.5), dec!(0.00010))
    }

    #[test]
    fn test_quote_splits_spread_around_mid() {
        let quote = model().quote(dec!(1.10000));
        assert_eq!(quote.bid, dec!(1.09995));
        assert_eq!(quote.ask, dec!(1.10005));
        assert_eq!(quote.mid, dec!(1.10000));
    }

    #[test]
    fn test_buy_fill_price_adds_slippage_above_ask() {
        assert_eq!(model().fill_price(Side::Buy, dec!(1.10000)), dec!(1.10010));
    }

    #[test]
    fn test_sell_fill_price_subtracts_slippage_below_bid() {
        assert_eq!(model().fill_price(Side::Sell, dec!(1.10000)), dec!(1.09990));
    }

    #[test]
    fn test_mark_price_by_position_direction() {
        let model = model();
        assert_eq!(model.mark_price(dec!(1), dec!(1.10000)), dec!(1.09995));
        assert_eq!(model.mark_price(dec!(-1), dec!(1.10000)), dec!(1.10005));
    }

    #[test]
    fn test_zero_spread_zero_slippage_collapses_to_open() {
        let model = PricingModel::new(dec!(0), dec!(0), dec!(0.0001));
        assert_eq!(model.fill_price(Side::Buy, dec!(1.2)), dec!(1.2));
        assert_eq!(model.fill_price(Side::Sell, dec!(1.2)), dec!(1.2));
    }

    #[test]
    fn test_pips_between() {
        let model = model();
        assert_eq!(model.pips_between(dec!(1.1010), dec!(1.1000)), dec!(10));
        assert_eq!(model.pips_between(dec!(1.1000), dec!(1.1010)), dec!(10));
    }

    #[test]
    fn test_pricing_is_independent_of_call_order() {
        let model = model();
        let first = model.fill_price(Side::Buy, dec!(1.10000));
        let _ = model.fill_price(Side::Sell, dec!(1.30000));
        let second = model.fill_price(Side::Buy, dec!(1.10000));
        assert_eq!(first, second);
    }
}
