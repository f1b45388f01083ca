use fx_paper_accounting::AccountingEngine;
use fx_paper_core::{AppConfig, Result};
use fx_paper_market::{build_provider, IngestionService};
use fx_paper_oms::OmsService;
use fx_paper_orchestrator::OrchestratorService;
use fx_paper_risk::RiskEngine;
use fx_paper_strategy::StrategyRunner;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared handler state: the pool plus one instance of each service.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub ingestion: Arc<IngestionService>,
    pub oms: Arc<OmsService>,
    pub risk: Arc<RiskEngine>,
    pub accounting: Arc<AccountingEngine>,
    pub orchestrator: Arc<OrchestratorService>,
    pub strategy: Arc<StrategyRunner>,
}

impl AppState {
    /// Wires all services from config.
    ///
    /// # Errors
    /// Returns a validation error for inconsistent configuration.
    pub fn from_config(pool: PgPool, config: AppConfig) -> Result<Self> {
        let provider = build_provider(&config.market_data)?;
        Ok(Self {
            ingestion: Arc::new(IngestionService::new(provider, config.market_data.clone())),
            oms: Arc::new(OmsService::from_config(&config)?),
            risk: Arc::new(RiskEngine::from_config(&config)?),
            accounting: Arc::new(AccountingEngine::new(
                config.account.clone(),
                config.execution.clone(),
            )),
            orchestrator: Arc::new(OrchestratorService::from_config(&config)?),
            strategy: Arc::new(StrategyRunner::new(config.strategy.clone())),
            pool,
            config,
        })
    }

    /// Configured default symbol, uppercased.
    #[must_use]
    pub fn default_symbol(&self) -> String {
        self.config.market_data.symbol.to_uppercase()
    }

    /// Configured default timeframe label.
    #[must_use]
    pub fn default_timeframe(&self) -> String {
        self.config.market_data.timeframe.to_uppercase()
    }
}
