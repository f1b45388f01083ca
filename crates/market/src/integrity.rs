//! Gap and duplicate detection against the timeframe grid.
//!
//! The grid is continuous: every slot between the aligned window bounds is
//! expected. Exchange sessions are not modeled.

use chrono::{DateTime, Utc};
use fx_paper_core::{Result, Timeframe};
use fx_paper_data::CandleRepository;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::collections::HashSet;

/// A maximal run of absent grid slots, both bounds inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRange {
    pub first_missing_open_time: DateTime<Utc>,
    pub last_missing_open_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub symbol: String,
    pub timeframe: String,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub expected_count: i64,
    pub actual_count: i64,
    pub missing_count: i64,
    pub duplicates_count: i64,
    pub missing_ranges: Vec<MissingRange>,
    pub is_complete: bool,
}

/// Checks candle integrity over the closed window `[start, end]`, both
/// bounds aligned down to the grid first.
///
/// # Errors
/// Returns an error if a store query fails.
pub async fn check_integrity(
    conn: &mut PgConnection,
    symbol: &str,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<IntegrityReport> {
    let start = timeframe.align_floor(start);
    let end = timeframe.align_floor(end);

    let stored =
        CandleRepository::open_times_in(&mut *conn, symbol, timeframe.as_str(), start, end).await?;
    let duplicates_count =
        CandleRepository::duplicate_count(&mut *conn, symbol, timeframe.as_str(), start, end)
            .await?;

    let report = assess_window(symbol, timeframe, start, end, &stored, duplicates_count);

    tracing::info!(
        symbol,
        timeframe = timeframe.as_str(),
        actual = report.actual_count,
        expected = report.expected_count,
        missing = report.missing_count,
        duplicates = report.duplicates_count,
        complete = report.is_complete,
        "integrity check"
    );

    Ok(report)
}

/// Pure grid walk: classifies each expected slot as present or absent and
/// folds absent slots into maximal contiguous ranges.
#[must_use]
pub fn assess_window(
    symbol: &str,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    stored: &[DateTime<Utc>],
    duplicates_count: i64,
) -> IntegrityReport {
    let expected_count = timeframe.slots_between(start, end);
    let present: HashSet<DateTime<Utc>> = stored.iter().copied().collect();

    let mut missing_ranges: Vec<MissingRange> = Vec::new();
    let mut missing_count = 0i64;
    let mut run_start: Option<DateTime<Utc>> = None;
    let mut run_end: Option<DateTime<Utc>> = None;

    let mut slot = start;
    while slot <= end {
        if present.contains(&slot) {
            if let (Some(first), Some(last)) = (run_start.take(), run_end.take()) {
                missing_ranges.push(MissingRange {
                    first_missing_open_time: first,
                    last_missing_open_time: last,
                });
            }
        } else {
            missing_count += 1;
            if run_start.is_none() {
                run_start = Some(slot);
            }
            run_end = Some(slot);
        }
        slot += timeframe.duration();
    }
    if let (Some(first), Some(last)) = (run_start, run_end) {
        missing_ranges.push(MissingRange {
            first_missing_open_time: first,
            last_missing_open_time: last,
        });
    }

    let actual_count = stored.len() as i64;
    IntegrityReport {
        symbol: symbol.to_string(),
        timeframe: timeframe.as_str().to_string(),
        earliest: stored.first().copied(),
        latest: stored.last().copied(),
        expected_count,
        actual_count,
        missing_count,
        duplicates_count,
        missing_ranges,
        is_complete: missing_count == 0 && duplicates_count == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
    }

    #[test]
    fn test_contiguous_window_is_complete() {
        let stored: Vec<_> = (0..=4).map(|i| slot(i * 5)).collect();
        let report = assess_window("EURUSD", Timeframe::M5, slot(0), slot(20), &stored, 0);
        assert_eq!(report.expected_count, 5);
        assert_eq!(report.actual_count, 5);
        assert_eq!(report.missing_count, 0);
        assert!(report.missing_ranges.is_empty());
        assert!(report.is_complete);
    }

    #[test]
    fn test_single_deleted_slot_yields_single_slot_range() {
        // Slots 00:00..00:20 with 00:10 absent.
        let stored = vec![slot(0), slot(5), slot(15), slot(20)];
        let report = assess_window("EURUSD", Timeframe::M5, slot(0), slot(20), &stored, 0);
        assert_eq!(report.missing_count, 1);
        assert_eq!(
            report.missing_ranges,
            vec![MissingRange {
                first_missing_open_time: slot(10),
                last_missing_open_time: slot(10),
            }]
        );
        assert!(!report.is_complete);
    }

    #[test]
    fn test_contiguous_run_of_absent_slots_folds_into_one_range() {
        let stored = vec![slot(0), slot(20)];
        let report = assess_window("EURUSD", Timeframe::M5, slot(0), slot(20), &stored, 0);
        assert_eq!(report.missing_count, 3);
        assert_eq!(
            report.missing_ranges,
            vec![MissingRange {
                first_missing_open_time: slot(5),
                last_missing_open_time: slot(15),
            }]
        );
    }

    #[test]
    fn test_two_separate_gaps_yield_two_ranges() {
        let stored = vec![slot(0), slot(10), slot(20)];
        let report = assess_window("EURUSD", Timeframe::M5, slot(0), slot(20), &stored, 0);
        assert_eq!(report.missing_count, 2);
        assert_eq!(report.missing_ranges.len(), 2);
        assert_eq!(report.missing_ranges[0].first_missing_open_time, slot(5));
        assert_eq!(report.missing_ranges[1].first_missing_open_time, slot(15));
    }

    #[test]
    fn test_leading_and_trailing_gaps_are_reported() {
        let stored = vec![slot(5), slot(10)];
        let report = assess_window("EURUSD", Timeframe::M5, slot(0), slot(20), &stored, 0);
        assert_eq!(report.missing_ranges.len(), 2);
        assert_eq!(report.missing_ranges[0].first_missing_open_time, slot(0));
        assert_eq!(report.missing_ranges[0].last_missing_open_time, slot(0));
        assert_eq!(report.missing_ranges[1].first_missing_open_time, slot(15));
        assert_eq!(report.missing_ranges[1].last_missing_open_time, slot(20));
    }

    #[test]
    fn test_duplicates_break_completeness() {
        let stored: Vec<_> = (0..=4).map(|i| slot(i * 5)).collect();
        let report = assess_window("EURUSD", Timeframe::M5, slot(0), slot(20), &stored, 1);
        assert_eq!(report.missing_count, 0);
        assert!(!report.is_complete);
    }

    #[test]
    fn test_empty_window_reports_everything_missing() {
        let report = assess_window("EURUSD", Timeframe::M5, slot(0), slot(20), &[], 0);
        assert_eq!(report.actual_count, 0);
        assert_eq!(report.missing_count, 5);
        assert_eq!(report.missing_ranges.len(), 1);
        assert!(report.earliest.is_none());
        assert!(report.latest.is_none());
    }
}
