//! Engine-error to HTTP mapping.
//!
//! 4xx for validation, lookup, and state errors; 5xx for store and vendor
//! failures (retryable by the caller).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fx_paper_core::EngineError;
use serde_json::json;

pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidStateTransition(_) | EngineError::IdempotencyConflict(_) => {
                StatusCode::CONFLICT
            }
            EngineError::DeterministicSafety(_) | EngineError::RiskRejected(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::StoreUnavailable(_) | EngineError::VendorUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            EngineError::Validation(_) => "validation",
            EngineError::NotFound(_) => "not_found",
            EngineError::DeterministicSafety(_) => "deterministic_safety",
            EngineError::RiskRejected(_) => "risk_rejected",
            EngineError::InvalidStateTransition(_) => "invalid_state_transition",
            EngineError::IdempotencyConflict(_) => "idempotency_conflict",
            EngineError::StoreUnavailable(_) => "store_unavailable",
            EngineError::VendorUnavailable(_) => "vendor_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "error": self.kind(),
            "message": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(EngineError::validation("x")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(EngineError::not_found("x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(EngineError::invalid_transition("x")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(EngineError::StoreUnavailable("x".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(EngineError::deterministic_safety("x")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
