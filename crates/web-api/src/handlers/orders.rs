//! Paper-broker order endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use fx_paper_core::{EngineError, OrderStatus};
use fx_paper_data::{FillRecord, OrderFilters, OrderRecord};
use fx_paper_oms::{PlaceOrderOutcome, PlaceOrderRequest};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub symbol: Option<String>,
    pub status: Option<String>,
    pub from_ts: Option<DateTime<Utc>>,
    pub to_ts: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: OrderRecord,
    pub fill: Option<FillRecord>,
}

/// POST /paper/order
pub async fn place(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<Json<PlaceOrderOutcome>> {
    let mut tx = state.pool.begin().await.map_err(EngineError::from)?;
    let outcome = state.oms.place(&mut tx, &request).await?;
    tx.commit().await.map_err(EngineError::from)?;
    Ok(Json(outcome))
}

/// GET /paper/orders
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<Json<Vec<OrderRecord>>> {
    let status = match &query.status {
        Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
            ApiError(EngineError::validation(format!("invalid status: {raw}")))
        })?),
        None => None,
    };
    let filters = OrderFilters {
        symbol: query.symbol.map(|s| s.to_uppercase()),
        status,
        from_ts: query.from_ts,
        to_ts: query.to_ts,
        limit: query.limit.unwrap_or(100).clamp(1, 1000),
    };
    let mut conn = state.pool.acquire().await.map_err(EngineError::from)?;
    let orders = state.oms.list(&mut conn, &filters).await?;
    Ok(Json(orders))
}

/// GET /paper/orders/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderDetail>> {
    let mut conn = state.pool.acquire().await.map_err(EngineError::from)?;
    let (order, fill) = state.oms.get(&mut conn, id).await?;
    Ok(Json(OrderDetail { order, fill }))
}

/// POST /paper/orders/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderRecord>> {
    let mut tx = state.pool.begin().await.map_err(EngineError::from)?;
    let order = state.oms.cancel(&mut tx, id).await?;
    tx.commit().await.map_err(EngineError::from)?;
    Ok(Json(order))
}
