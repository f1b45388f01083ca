//! Registry of live-loop actors keyed by `(symbol, timeframe)`.

use fx_paper_core::{AppConfig, EngineError, Result, Timeframe};
use fx_paper_market::IngestionService;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::controller::LoopController;
use crate::handle::LoopHandle;
use crate::service::OrchestratorService;

pub struct LoopRegistry {
    loops: RwLock<HashMap<String, LoopHandle>>,
}

impl LoopRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loops: RwLock::new(HashMap::new()),
        }
    }

    fn key(symbol: &str, timeframe: Timeframe) -> String {
        format!("{}:{}", symbol.to_uppercase(), timeframe.as_str())
    }

    /// Spawns the loop actor for the configured `(symbol, timeframe)` and
    /// returns its handle. At most one loop per key.
    ///
    /// # Errors
    /// Returns a validation error when the loop already exists or the
    /// timeframe is invalid.
    pub async fn spawn_loop(
        &self,
        pool: PgPool,
        orchestrator: Arc<OrchestratorService>,
        ingestion: Arc<IngestionService>,
        config: &AppConfig,
    ) -> Result<LoopHandle> {
        let timeframe = Timeframe::parse(&config.market_data.timeframe).ok_or_else(|| {
            EngineError::validation(format!(
                "invalid timeframe: {}",
                config.market_data.timeframe
            ))
        })?;
        let key = Self::key(&config.market_data.symbol, timeframe);

        let mut loops = self.loops.write().await;
        if loops.contains_key(&key) {
            return Err(EngineError::validation(format!(
                "loop {key} already running"
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let handle = LoopHandle::new(tx);
        let actor = LoopController::new(pool, orchestrator, ingestion, config, timeframe, rx);
        let actor_key = key.clone();
        tokio::spawn(async move {
            actor.run().await;
            tracing::info!(key = %actor_key, "loop actor exited");
        });

        loops.insert(key, handle.clone());
        Ok(handle)
    }

    /// Handle for a running loop.
    #[must_use]
    pub async fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<LoopHandle> {
        self.loops
            .read()
            .await
            .get(&Self::key(symbol, timeframe))
            .cloned()
    }

    /// Shuts down every loop.
    ///
    /// # Errors
    /// Returns the first shutdown failure.
    pub async fn shutdown_all(&self) -> Result<()> {
        let handles: Vec<_> = self.loops.read().await.values().cloned().collect();
        for handle in handles {
            handle.shutdown().await?;
        }
        Ok(())
    }
}

impl Default for LoopRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_symbol_case() {
        assert_eq!(LoopRegistry::key("eurusd", Timeframe::M5), "EURUSD:M5");
    }

    #[tokio::test]
    async fn test_get_on_empty_registry_is_none() {
        let registry = LoopRegistry::new();
        assert!(registry.get("EURUSD", Timeframe::M5).await.is_none());
    }
}
