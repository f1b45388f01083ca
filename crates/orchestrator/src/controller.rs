//! Live-loop actor: one serial worker per `(symbol, timeframe)`.
//!
//! Each tick ingests fresh candles and runs one cycle for the latest stored
//! bar. Commands arrive over an mpsc channel; the worker owns all mutable
//! state, so cycles for a key are serialized by construction.

use fx_paper_core::{AppConfig, Timeframe};
use fx_paper_market::IngestionService;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::commands::{LoopCommand, LoopState, LoopStatus};
use crate::service::OrchestratorService;

pub struct LoopController {
    pool: PgPool,
    orchestrator: Arc<OrchestratorService>,
    ingestion: Arc<IngestionService>,
    symbol: String,
    timeframe: Timeframe,
    state: LoopState,
    iterations: u64,
    last_candle_ts: Option<chrono::DateTime<chrono::Utc>>,
    last_run_status: Option<String>,
    last_error: Option<String>,
    rx: mpsc::Receiver<LoopCommand>,
}

impl LoopController {
    #[must_use]
    pub fn new(
        pool: PgPool,
        orchestrator: Arc<OrchestratorService>,
        ingestion: Arc<IngestionService>,
        config: &AppConfig,
        timeframe: Timeframe,
        rx: mpsc::Receiver<LoopCommand>,
    ) -> Self {
        Self {
            pool,
            orchestrator,
            ingestion,
            symbol: config.market_data.symbol.to_uppercase(),
            timeframe,
            state: LoopState::Stopped,
            iterations: 0,
            last_candle_ts: None,
            last_run_status: None,
            last_error: None,
            rx,
        }
    }

    /// Runs the actor until shutdown.
    pub async fn run(mut self) {
        tracing::info!(symbol = %self.symbol, timeframe = self.timeframe.as_str(), "loop starting");

        let period = self
            .timeframe
            .duration()
            .to_std()
            .unwrap_or(Duration::from_secs(300));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(LoopCommand::Start) => {
                            tracing::info!(symbol = %self.symbol, "loop started");
                            self.state = LoopState::Running;
                        }
                        Some(LoopCommand::Stop) => {
                            tracing::info!(symbol = %self.symbol, "loop stopped");
                            self.state = LoopState::Stopped;
                        }
                        Some(LoopCommand::GetStatus(reply)) => {
                            let _ = reply.send(self.status());
                        }
                        Some(LoopCommand::Shutdown) | None => {
                            tracing::info!(symbol = %self.symbol, "loop shutting down");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if self.state == LoopState::Running {
                        self.tick().await;
                    }
                }
            }
        }
    }

    async fn tick(&mut self) {
        self.iterations += 1;

        let ingest = self
            .ingestion
            .ingest(&self.pool, &self.symbol, self.timeframe.as_str())
            .await;
        if let Err(err) = ingest {
            // Vendor hiccups leave the loop running; the next tick retries.
            tracing::warn!(symbol = %self.symbol, %err, "ingest failed");
            self.last_error = Some(err.to_string());
            if !err.is_retryable() {
                self.state = LoopState::Error;
            }
            return;
        }

        let latest = match fx_paper_data::CandleRepository::latest(
            &self.pool,
            &self.symbol,
            self.timeframe.as_str(),
        )
        .await
        {
            Ok(Some(candle)) => candle,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(symbol = %self.symbol, %err, "candle lookup failed");
                self.last_error = Some(err.to_string());
                return;
            }
        };

        match self
            .orchestrator
            .run_cycle(
                &self.pool,
                &self.symbol,
                self.timeframe.as_str(),
                latest.open_time,
            )
            .await
        {
            Ok(report) => {
                self.last_candle_ts = Some(latest.open_time);
                self.last_run_status = Some(report.status.clone());
                self.last_error = report.error_text;
            }
            Err(err) => {
                tracing::error!(symbol = %self.symbol, %err, "cycle failed");
                self.last_error = Some(err.to_string());
                self.state = LoopState::Error;
            }
        }
    }

    fn status(&self) -> LoopStatus {
        LoopStatus {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.as_str().to_string(),
            state: self.state,
            iterations: self.iterations,
            last_candle_ts: self.last_candle_ts,
            last_run_status: self.last_run_status.clone(),
            last_error: self.last_error.clone(),
        }
    }
}
