//! Strategy catalog and dry-run endpoints.

use axum::extract::State;
use axum::Json;
use fx_paper_core::{EngineError, Timeframe};
use fx_paper_data::CandleRepository;
use fx_paper_strategy::{StrategyCatalogItem, StrategyIntent};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StrategyRunRequest {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub strategy: Option<String>,
}

/// GET /strategy/strategies
pub async fn catalog(State(state): State<AppState>) -> Json<Vec<StrategyCatalogItem>> {
    Json(state.strategy.catalog())
}

/// POST /strategy/run — compute the intent at the latest stored candle
/// without placing anything.
pub async fn run(
    State(state): State<AppState>,
    Json(request): Json<StrategyRunRequest>,
) -> ApiResult<Json<StrategyIntent>> {
    let symbol = request
        .symbol
        .map_or_else(|| state.default_symbol(), |s| s.to_uppercase());
    let timeframe_raw = request
        .timeframe
        .map_or_else(|| state.default_timeframe(), |t| t.to_uppercase());
    let timeframe = Timeframe::parse(&timeframe_raw).ok_or_else(|| {
        ApiError(EngineError::validation(format!(
            "invalid timeframe: {timeframe_raw}"
        )))
    })?;
    let strategy_name = request.strategy.unwrap_or_else(|| "ema_atr".to_string());

    let latest = CandleRepository::latest(&state.pool, &symbol, timeframe.as_str())
        .await?
        .ok_or_else(|| {
            ApiError(EngineError::deterministic_safety(format!(
                "strategy run requires stored candles for {symbol}/{timeframe_raw}"
            )))
        })?;

    let intent = state
        .strategy
        .intent_at(
            &state.pool,
            &strategy_name,
            &symbol,
            timeframe,
            latest.open_time,
        )
        .await?;
    Ok(Json(intent))
}
