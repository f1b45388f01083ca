//! Accounting view and recompute endpoints.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use fx_paper_core::EngineError;
use fx_paper_data::{
    AccountRecord, AccountRepository, AccountSnapshotRecord, CandleRepository, PositionRecord,
    PositionRepository, SnapshotRepository, ACCOUNT_ID,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AccountStatusResponse {
    pub account: AccountRecord,
    pub latest_snapshot: Option<AccountSnapshotRecord>,
    pub open_positions: Vec<PositionRecord>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RecomputeRequest {
    pub asof: Option<DateTime<Utc>>,
}

/// GET /v7/account/status
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<AccountStatusResponse>> {
    let account = AccountRepository::get(&state.pool)
        .await?
        .ok_or_else(|| ApiError(EngineError::not_found("account not initialized")))?;
    let latest_snapshot = SnapshotRepository::latest(&state.pool, ACCOUNT_ID).await?;
    let open_positions = PositionRepository::open_positions(&state.pool, ACCOUNT_ID).await?;
    Ok(Json(AccountStatusResponse {
        account,
        latest_snapshot,
        open_positions,
    }))
}

/// POST /v7/account/recompute — force accounting + mark-to-market at the
/// requested (or latest) candle.
pub async fn recompute(
    State(state): State<AppState>,
    Json(request): Json<RecomputeRequest>,
) -> ApiResult<Json<AccountSnapshotRecord>> {
    let symbol = state.default_symbol();
    let timeframe = state.default_timeframe();

    let candle = match request.asof {
        Some(asof) => CandleRepository::exact(&state.pool, &symbol, &timeframe, asof).await?,
        None => CandleRepository::latest(&state.pool, &symbol, &timeframe).await?,
    }
    .ok_or_else(|| {
        ApiError(EngineError::deterministic_safety(format!(
            "recompute requires a stored candle for {symbol}/{timeframe}"
        )))
    })?;

    let mut tx = state.pool.begin().await.map_err(EngineError::from)?;
    let snapshot = state
        .accounting
        .process_accounting_for_candle(&mut tx, &symbol, &timeframe, candle.open_time)
        .await?;
    tx.commit().await.map_err(EngineError::from)?;
    Ok(Json(snapshot))
}
