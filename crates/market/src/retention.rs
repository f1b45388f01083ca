//! Candle retention. The cutoff subtraction is the only place wall-clock
//! time enters the core; aged candles are never referenced by live
//! decisions.

use chrono::{DateTime, Duration, Utc};
use fx_paper_core::Result;
use fx_paper_data::CandleRepository;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneReport {
    pub deleted_count: u64,
    pub cutoff_time: DateTime<Utc>,
    pub retention_days: i64,
}

/// Deletes candles whose `open_time` is older than `now - before_days`.
///
/// # Errors
/// Returns an error if the delete fails.
pub async fn prune_candles(pool: &PgPool, before_days: i64) -> Result<PruneReport> {
    let cutoff_time = Utc::now() - Duration::days(before_days);
    let deleted_count = CandleRepository::delete_before(pool, cutoff_time).await?;

    tracing::info!(
        deleted = deleted_count,
        %cutoff_time,
        retention_days = before_days,
        "pruned candles"
    );

    Ok(PruneReport {
        deleted_count,
        cutoff_time,
        retention_days: before_days,
    })
}
