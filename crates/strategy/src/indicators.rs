//! Indicator calculations on decimal series.
//!
//! Outputs are aligned with the input length; `None` marks warmup slots
//! where the indicator is not yet defined.

use rust_decimal::Decimal;

/// Exponential moving average, seeded with the SMA of the first `period`
/// values, `alpha = 2 / (period + 1)`.
#[must_use]
pub fn ema(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let seed: Decimal = values[..period].iter().sum::<Decimal>() / Decimal::from(period);
    let mut prev = seed;
    out[period - 1] = Some(seed);

    let alpha = Decimal::TWO / Decimal::from(period + 1);
    for i in period..values.len() {
        prev = (values[i] - prev) * alpha + prev;
        out[i] = Some(prev);
    }

    out
}

fn true_range(high: Decimal, low: Decimal, prev_close: Decimal) -> Decimal {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Average true range with Wilder smoothing. The first value is the mean of
/// the first `period` true ranges; later values use
/// `atr' = (atr * (period - 1) + tr) / period`.
#[must_use]
pub fn atr(
    highs: &[Decimal],
    lows: &[Decimal],
    closes: &[Decimal],
    period: usize,
) -> Vec<Option<Decimal>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n < 2 || n <= period {
        return out;
    }
    debug_assert!(highs.len() == n && lows.len() == n);

    let mut tr = Vec::with_capacity(n);
    tr.push(Decimal::ZERO);
    for i in 1..n {
        tr.push(true_range(highs[i], lows[i], closes[i - 1]));
    }

    let first: Decimal = tr[1..=period].iter().sum::<Decimal>() / Decimal::from(period);
    out[period] = Some(first);

    let mut prev = first;
    let period_dec = Decimal::from(period);
    for i in (period + 1)..n {
        prev = (prev * (period_dec - Decimal::ONE) + tr[i]) / period_dec;
        out[i] = Some(prev);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ema_warmup_is_none() {
        let values = vec![dec!(10), dec!(9)];
        let out = ema(&values, 3);
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn test_ema_period_three_exact_values() {
        // seed = (10 + 9 + 8) / 3 = 9; alpha = 0.5
        // next = (20 - 9) * 0.5 + 9 = 14.5
        let values = vec![dec!(10), dec!(9), dec!(8), dec!(20)];
        let out = ema(&values, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(dec!(9)));
        assert_eq!(out[3], Some(dec!(14.5)));
    }

    #[test]
    fn test_ema_of_constant_series_is_constant() {
        let values = vec![dec!(5); 10];
        let out = ema(&values, 4);
        for value in out.iter().skip(3) {
            assert_eq!(*value, Some(dec!(5)));
        }
    }

    #[test]
    fn test_true_range_dominates_on_gap() {
        // Gap up: |high - prev_close| exceeds the bar's own range.
        assert_eq!(true_range(dec!(21), dec!(19), dec!(8)), dec!(13));
        // Quiet bar: high - low dominates.
        assert_eq!(true_range(dec!(11), dec!(9), dec!(10)), dec!(2));
    }

    #[test]
    fn test_atr_wilder_smoothing_exact_values() {
        // Bars around closes 10, 9, 8, 20 with high = close + 1,
        // low = close - 1:
        //   tr1 = 2, tr2 = 2, tr3 = max(2, 13, 11) = 13
        //   atr[2] = (2 + 2) / 2 = 2
        //   atr[3] = (2 * 1 + 13) / 2 = 7.5
        let closes = vec![dec!(10), dec!(9), dec!(8), dec!(20)];
        let highs = vec![dec!(11), dec!(10), dec!(9), dec!(21)];
        let lows = vec![dec!(9), dec!(8), dec!(7), dec!(19)];
        let out = atr(&highs, &lows, &closes, 2);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(dec!(2)));
        assert_eq!(out[3], Some(dec!(7.5)));
    }

    #[test]
    fn test_atr_requires_more_than_period_bars() {
        let closes = vec![dec!(10), dec!(9)];
        let highs = vec![dec!(11), dec!(10)];
        let lows = vec![dec!(9), dec!(8)];
        let out = atr(&highs, &lows, &closes, 2);
        assert_eq!(out, vec![None, None]);
    }
}
