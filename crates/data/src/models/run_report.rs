//! Orchestrator run reports, unique per `(symbol, timeframe, candle_ts)`.

use chrono::{DateTime, Utc};
use fx_paper_core::RunStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunReportRecord {
    pub run_id: Uuid,
    pub symbol: String,
    pub timeframe: String,
    pub candle_ts: DateTime<Utc>,
    pub status: String,
    pub intent_json: Option<JsonValue>,
    pub risk_json: Option<JsonValue>,
    pub order_json: Option<JsonValue>,
    pub fill_json: Option<JsonValue>,
    pub positions_json: Option<JsonValue>,
    pub account_json: Option<JsonValue>,
    pub summary_text: String,
    pub telegram_text: String,
    pub error_text: Option<String>,
    pub mode: String,
}

impl RunReportRecord {
    /// Returns the parsed run status.
    #[must_use]
    pub fn parsed_status(&self) -> Option<RunStatus> {
        RunStatus::parse(&self.status)
    }
}

/// Upsert payload for one cycle's report.
#[derive(Debug, Clone, Default)]
pub struct NewRunReport {
    pub intent_json: Option<JsonValue>,
    pub risk_json: Option<JsonValue>,
    pub order_json: Option<JsonValue>,
    pub fill_json: Option<JsonValue>,
    pub positions_json: Option<JsonValue>,
    pub account_json: Option<JsonValue>,
    pub summary_text: String,
    pub telegram_text: String,
    pub error_text: Option<String>,
    pub mode: String,
}
