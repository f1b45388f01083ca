use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Control messages for a live trading loop.
#[derive(Debug)]
pub enum LoopCommand {
    Start,
    Stop,
    GetStatus(oneshot::Sender<LoopStatus>),
    Shutdown,
}

/// Loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Stopped,
    Running,
    Error,
}

/// Snapshot of a loop's progress. Reads never block the worker: the actor
/// answers with a copy through a oneshot channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopStatus {
    pub symbol: String,
    pub timeframe: String,
    pub state: LoopState,
    pub iterations: u64,
    pub last_candle_ts: Option<DateTime<Utc>>,
    pub last_run_status: Option<String>,
    pub last_error: Option<String>,
}
