//! OHLCV candle rows.

use chrono::{DateTime, Utc};
use fx_paper_core::{EngineError, Result, Timeframe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stored, closed OHLCV bar.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandleRecord {
    pub id: i64,
    pub symbol: String,
    pub timeframe: String,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub source: String,
    pub ingested_at: DateTime<Utc>,
}

/// A validated candle ready for upsert. Construct through
/// [`NewCandle::validated`] so OHLC sanity and grid alignment hold by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCandle {
    pub symbol: String,
    pub timeframe: String,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub source: String,
}

impl NewCandle {
    /// Validates OHLC invariants and timeframe-grid alignment.
    ///
    /// # Errors
    /// Returns a validation error naming the violated constraint. The caller
    /// skips the row; a bad candle is never fatal to the batch.
    #[allow(clippy::too_many_arguments)]
    pub fn validated(
        symbol: &str,
        timeframe: Timeframe,
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Option<Decimal>,
        source: &str,
    ) -> Result<Self> {
        if high < low {
            return Err(EngineError::validation(format!(
                "high ({high}) must be >= low ({low})"
            )));
        }
        if high < open || high < close {
            return Err(EngineError::validation(format!(
                "high ({high}) must be >= open ({open}) and close ({close})"
            )));
        }
        if low > open || low > close {
            return Err(EngineError::validation(format!(
                "low ({low}) must be <= open ({open}) and close ({close})"
            )));
        }
        if !timeframe.is_aligned(open_time) {
            return Err(EngineError::validation(format!(
                "open_time {open_time} is not aligned to the {} grid",
                timeframe.as_str()
            )));
        }

        Ok(Self {
            symbol: symbol.to_uppercase(),
            timeframe: timeframe.as_str().to_string(),
            open_time,
            open,
            high,
            low,
            close,
            volume,
            source: source.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn aligned_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap()
    }

    #[test]
    fn test_validated_accepts_sane_candle() {
        let candle = NewCandle::validated(
            "eurusd",
            Timeframe::M5,
            aligned_ts(),
            dec!(1.1000),
            dec!(1.1010),
            dec!(1.0990),
            dec!(1.1005),
            Some(dec!(1000)),
            "mock",
        )
        .unwrap();
        assert_eq!(candle.symbol, "EURUSD");
        assert_eq!(candle.timeframe, "M5");
    }

    #[test]
    fn test_validated_rejects_high_below_low() {
        let err = NewCandle::validated(
            "EURUSD",
            Timeframe::M5,
            aligned_ts(),
            dec!(1.10),
            dec!(1.09),
            dec!(1.11),
            dec!(1.10),
            None,
            "mock",
        )
        .unwrap_err();
        assert!(err.to_string().contains("high"));
    }

    #[test]
    fn test_validated_rejects_high_below_close() {
        let err = NewCandle::validated(
            "EURUSD",
            Timeframe::M5,
            aligned_ts(),
            dec!(1.10),
            dec!(1.101),
            dec!(1.099),
            dec!(1.102),
            None,
            "mock",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_validated_rejects_misaligned_open_time() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 7, 0).unwrap();
        let err = NewCandle::validated(
            "EURUSD",
            Timeframe::M5,
            ts,
            dec!(1.10),
            dec!(1.101),
            dec!(1.099),
            dec!(1.1005),
            None,
            "mock",
        )
        .unwrap_err();
        assert!(err.to_string().contains("aligned"));
    }
}
