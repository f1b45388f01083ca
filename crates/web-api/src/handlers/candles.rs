//! Candle store and ingestion endpoints.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use fx_paper_core::{EngineError, Timeframe};
use fx_paper_data::{CandleRecord, CandleRepository};
use fx_paper_market::{check_integrity, prune_candles, IngestReport, IntegrityReport, PruneReport};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CandleKeyQuery {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandleRangeQuery {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IntegrityQuery {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PruneRequest {
    pub before_days: Option<i64>,
}

fn resolve_key(state: &AppState, symbol: &Option<String>, timeframe: &Option<String>) -> (String, String) {
    (
        symbol
            .as_deref()
            .map_or_else(|| state.default_symbol(), str::to_uppercase),
        timeframe
            .as_deref()
            .map_or_else(|| state.default_timeframe(), str::to_uppercase),
    )
}

/// GET /v1/candles/latest
pub async fn latest(
    State(state): State<AppState>,
    Query(query): Query<CandleKeyQuery>,
) -> ApiResult<Json<CandleRecord>> {
    let (symbol, timeframe) = resolve_key(&state, &query.symbol, &query.timeframe);
    let candle = CandleRepository::latest(&state.pool, &symbol, &timeframe)
        .await?
        .ok_or_else(|| {
            ApiError(EngineError::not_found(format!(
                "no candles for {symbol}/{timeframe}"
            )))
        })?;
    Ok(Json(candle))
}

/// GET /v1/candles
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<CandleRangeQuery>,
) -> ApiResult<Json<Vec<CandleRecord>>> {
    let (symbol, timeframe) = resolve_key(&state, &query.symbol, &query.timeframe);
    let limit = query.limit.unwrap_or(500).clamp(1, 5000);
    let rows = CandleRepository::range(
        &state.pool,
        &symbol,
        &timeframe,
        query.start,
        query.end,
        limit,
    )
    .await?;
    Ok(Json(rows))
}

/// GET /v1/candles/integrity
pub async fn integrity(
    State(state): State<AppState>,
    Query(query): Query<IntegrityQuery>,
) -> ApiResult<Json<IntegrityReport>> {
    let (symbol, timeframe) = resolve_key(&state, &query.symbol, &query.timeframe);
    let tf = Timeframe::parse(&timeframe)
        .ok_or_else(|| ApiError(EngineError::validation(format!("invalid timeframe: {timeframe}"))))?;

    // Anchor the window at the latest stored bar so a quiet weekend tail
    // does not read as a gap.
    let end = CandleRepository::latest(&state.pool, &symbol, &timeframe)
        .await?
        .map_or_else(|| tf.align_floor(Utc::now()), |candle| candle.open_time);
    let start = end - Duration::days(query.days);

    let mut conn = state.pool.acquire().await.map_err(EngineError::from)?;
    let report = check_integrity(&mut conn, &symbol, tf, start, end).await?;
    Ok(Json(report))
}

/// POST /v1/candles/admin/ingest
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<CandleKeyQuery>,
) -> ApiResult<Json<IngestReport>> {
    let (symbol, timeframe) = resolve_key(&state, &request.symbol, &request.timeframe);
    let report = state.ingestion.ingest(&state.pool, &symbol, &timeframe).await?;
    Ok(Json(report))
}

/// POST /v1/candles/admin/backfill
pub async fn backfill(
    State(state): State<AppState>,
    Json(request): Json<BackfillRequest>,
) -> ApiResult<Json<IngestReport>> {
    let (symbol, timeframe) = resolve_key(&state, &request.symbol, &request.timeframe);
    if request.end <= request.start {
        return Err(ApiError(EngineError::validation(
            "backfill end must be after start",
        )));
    }
    let report = state
        .ingestion
        .backfill(&state.pool, &symbol, &timeframe, request.start, request.end)
        .await?;
    Ok(Json(report))
}

/// POST /v1/candles/admin/prune
pub async fn prune(
    State(state): State<AppState>,
    Json(request): Json<PruneRequest>,
) -> ApiResult<Json<PruneReport>> {
    let days = request
        .before_days
        .unwrap_or(state.config.market_data.retention_days);
    if days <= 0 {
        return Err(ApiError(EngineError::validation(
            "before_days must be positive",
        )));
    }
    let report = prune_candles(&state.pool, days).await?;
    Ok(Json(report))
}
