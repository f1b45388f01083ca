//! Error types shared across the paper-trading engine.
//!
//! Validation failures and risk rejections are recorded on the order row and
//! returned to the caller; determinism-safety violations abort the operation
//! before anything is persisted; store and vendor failures are retryable.

use thiserror::Error;

/// Errors that can occur in the trading engine core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request or candle failing OHLC/alignment checks.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced candle, order, or run report does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A candle required for a deterministic decision is absent.
    #[error("deterministic safety violation: {0}")]
    DeterministicSafety(String),

    /// Pre-trade risk check rejected the order. The reason text is stable
    /// and stored verbatim on the rejected order row.
    #[error("risk rejected: {0}")]
    RiskRejected(String),

    /// Attempted an order transition out of a terminal state.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Idempotency key replayed with an incompatible payload.
    #[error("idempotency conflict: {0}")]
    IdempotencyConflict(String),

    /// Backing store is unreachable or rejected the statement.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Market-data vendor is unreachable or returned an invalid payload.
    #[error("vendor unavailable: {0}")]
    VendorUnavailable(String),
}

impl EngineError {
    /// Creates a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a determinism-safety error.
    pub fn deterministic_safety(msg: impl Into<String>) -> Self {
        Self::DeterministicSafety(msg.into())
    }

    /// Creates an invalid-state-transition error.
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    /// Creates an idempotency-conflict error.
    pub fn idempotency_conflict(msg: impl Into<String>) -> Self {
        Self::IdempotencyConflict(msg.into())
    }

    /// Creates a vendor error.
    pub fn vendor(msg: impl Into<String>) -> Self {
        Self::VendorUnavailable(msg.into())
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::VendorUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_is_retryable() {
        let err = EngineError::StoreUnavailable("connection refused".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_vendor_error_is_retryable() {
        let err = EngineError::vendor("timeout");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_error_is_not_retryable() {
        let err = EngineError::validation("high < low");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("high < low"));
    }

    #[test]
    fn test_deterministic_safety_is_not_retryable() {
        let err = EngineError::deterministic_safety("fill candle missing");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("deterministic safety"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_idempotency_conflict_display() {
        let err = EngineError::idempotency_conflict("key replayed with different side");
        assert!(err.to_string().contains("idempotency conflict"));
    }
}
