//! Orchestrator cycle and run-report endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use fx_paper_core::EngineError;
use fx_paper_data::{CandleRepository, RunReportRecord};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct RunCycleRequest {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub candle_ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub limit: Option<i64>,
}

/// POST /orchestrator/run — drive one cycle. Without `candle_ts` the latest
/// stored candle is used.
pub async fn run(
    State(state): State<AppState>,
    Json(request): Json<RunCycleRequest>,
) -> ApiResult<Json<RunReportRecord>> {
    let symbol = request
        .symbol
        .map_or_else(|| state.default_symbol(), |s| s.to_uppercase());
    let timeframe = request
        .timeframe
        .map_or_else(|| state.default_timeframe(), |t| t.to_uppercase());

    let candle_ts = match request.candle_ts {
        Some(ts) => ts,
        None => {
            CandleRepository::latest(&state.pool, &symbol, &timeframe)
                .await?
                .ok_or_else(|| {
                    ApiError(EngineError::deterministic_safety(format!(
                        "no candles stored for {symbol}/{timeframe}"
                    )))
                })?
                .open_time
        }
    };

    let report = state
        .orchestrator
        .run_cycle(&state.pool, &symbol, &timeframe, candle_ts)
        .await?;
    Ok(Json(report))
}

/// GET /orchestrator/runs
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> ApiResult<Json<Vec<RunReportRecord>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let reports = state.orchestrator.list_runs(&state.pool, limit).await?;
    Ok(Json(reports))
}

/// GET /orchestrator/runs/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunReportRecord>> {
    let report = state.orchestrator.get_run(&state.pool, run_id).await?;
    Ok(Json(report))
}
