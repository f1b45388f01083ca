//! Risk snapshot and dry-run check endpoints.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use fx_paper_core::{EngineError, Side};
use fx_paper_data::CandleRepository;
use fx_paper_risk::{RiskDecision, RiskSnapshot};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RiskStatusQuery {
    pub symbol: Option<String>,
    pub asof: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RiskCheckRequest {
    pub symbol: Option<String>,
    pub side: Side,
    pub qty: Decimal,
    pub stop_distance_pips: Option<Decimal>,
    pub asof: Option<DateTime<Utc>>,
}

async fn resolve_asof(
    state: &AppState,
    symbol: &str,
    asof: Option<DateTime<Utc>>,
) -> ApiResult<DateTime<Utc>> {
    if let Some(asof) = asof {
        return Ok(asof);
    }
    let candle = CandleRepository::latest(&state.pool, symbol, &state.default_timeframe())
        .await?
        .ok_or_else(|| {
            ApiError(EngineError::deterministic_safety(format!(
                "risk status requires a stored candle for {symbol}"
            )))
        })?;
    Ok(candle.open_time)
}

/// GET /v6/risk/status
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<RiskStatusQuery>,
) -> ApiResult<Json<RiskSnapshot>> {
    let symbol = query
        .symbol
        .map_or_else(|| state.default_symbol(), |s| s.to_uppercase());
    let asof = resolve_asof(&state, &symbol, query.asof).await?;

    let mut conn = state.pool.acquire().await.map_err(EngineError::from)?;
    let snapshot = state.risk.compute_snapshot(&mut conn, &symbol, asof).await?;
    Ok(Json(snapshot))
}

/// POST /v6/risk/check — a dry run: the decision is returned, nothing is
/// placed.
pub async fn check(
    State(state): State<AppState>,
    Json(request): Json<RiskCheckRequest>,
) -> ApiResult<Json<RiskDecision>> {
    let symbol = request
        .symbol
        .map_or_else(|| state.default_symbol(), |s| s.to_uppercase());
    let asof = resolve_asof(&state, &symbol, request.asof).await?;

    let mut conn = state.pool.acquire().await.map_err(EngineError::from)?;
    let decision = state
        .risk
        .check_order(
            &mut conn,
            &symbol,
            request.side,
            request.qty,
            request.stop_distance_pips,
            asof,
        )
        .await?;
    Ok(Json(decision))
}
