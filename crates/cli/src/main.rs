use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fx-paper")]
#[command(about = "Deterministic FX paper-trading engine", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the control surface, optionally with the live trading loop
    Serve {
        /// Start the live ingest-and-cycle loop immediately
        #[arg(long)]
        live: bool,
    },
    /// Pull candles from the configured provider and upsert them
    Ingest {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Backfill candles for an explicit range
    Backfill {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        /// Start time, ISO 8601 (e.g. "2024-01-01T00:00:00Z")
        #[arg(long)]
        start: DateTime<Utc>,
        /// End time, ISO 8601, exclusive
        #[arg(long)]
        end: DateTime<Utc>,
    },
    /// Check candle integrity over a trailing window
    Integrity {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Delete candles older than the retention horizon
    Prune {
        #[arg(long)]
        before_days: Option<i64>,
    },
    /// Run one orchestrator cycle at a candle time (default: latest stored)
    RunCycle {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        candle_ts: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = fx_paper_core::ConfigLoader::load_from(&cli.config)?;

    let pool = fx_paper_data::connect_pool(&config.database).await?;
    fx_paper_data::run_migrations(&pool).await?;

    let symbol_default = config.market_data.symbol.clone();
    let timeframe_default = config.market_data.timeframe.clone();

    match cli.command {
        Commands::Serve { live } => {
            let state = fx_paper_web_api::AppState::from_config(pool.clone(), config.clone())?;

            if live {
                let registry = fx_paper_orchestrator::LoopRegistry::new();
                let handle = registry
                    .spawn_loop(
                        pool,
                        state.orchestrator.clone(),
                        state.ingestion.clone(),
                        &config,
                    )
                    .await?;
                handle.start().await?;
                tracing::info!("live loop started");
            }

            let addr = format!("{}:{}", config.server.host, config.server.port);
            fx_paper_web_api::ApiServer::new(state).serve(&addr).await?;
        }
        Commands::Ingest { symbol, timeframe } => {
            let service = ingestion_service(&config)?;
            let report = service
                .ingest(
                    &pool,
                    symbol.as_deref().unwrap_or(&symbol_default),
                    timeframe.as_deref().unwrap_or(&timeframe_default),
                )
                .await?;
            println!("{}", serde_pretty(&report)?);
        }
        Commands::Backfill {
            symbol,
            timeframe,
            start,
            end,
        } => {
            let service = ingestion_service(&config)?;
            let report = service
                .backfill(
                    &pool,
                    symbol.as_deref().unwrap_or(&symbol_default),
                    timeframe.as_deref().unwrap_or(&timeframe_default),
                    start,
                    end,
                )
                .await?;
            println!("{}", serde_pretty(&report)?);
        }
        Commands::Integrity {
            symbol,
            timeframe,
            days,
        } => {
            let symbol = symbol.unwrap_or(symbol_default).to_uppercase();
            let timeframe_raw = timeframe.unwrap_or(timeframe_default);
            let tf = fx_paper_core::Timeframe::parse(&timeframe_raw)
                .ok_or_else(|| anyhow::anyhow!("invalid timeframe: {timeframe_raw}"))?;

            let end = fx_paper_data::CandleRepository::latest(&pool, &symbol, tf.as_str())
                .await?
                .map_or_else(|| tf.align_floor(Utc::now()), |candle| candle.open_time);
            let start = end - chrono::Duration::days(days);

            let mut conn = pool.acquire().await?;
            let report =
                fx_paper_market::check_integrity(&mut conn, &symbol, tf, start, end).await?;
            println!("{}", serde_pretty(&report)?);
        }
        Commands::Prune { before_days } => {
            let days = before_days.unwrap_or(config.market_data.retention_days);
            let report = fx_paper_market::prune_candles(&pool, days).await?;
            println!("{}", serde_pretty(&report)?);
        }
        Commands::RunCycle {
            symbol,
            timeframe,
            candle_ts,
        } => {
            let symbol = symbol.unwrap_or(symbol_default).to_uppercase();
            let timeframe = timeframe.unwrap_or(timeframe_default).to_uppercase();
            let orchestrator = fx_paper_orchestrator::OrchestratorService::from_config(&config)?;

            let candle_ts = match candle_ts {
                Some(ts) => ts,
                None => {
                    fx_paper_data::CandleRepository::latest(&pool, &symbol, &timeframe)
                        .await?
                        .ok_or_else(|| {
                            anyhow::anyhow!("no candles stored for {symbol}/{timeframe}")
                        })?
                        .open_time
                }
            };

            let report = orchestrator
                .run_cycle(&pool, &symbol, &timeframe, candle_ts)
                .await?;
            println!("{}", report.telegram_text);
        }
    }

    Ok(())
}

fn ingestion_service(
    config: &fx_paper_core::AppConfig,
) -> anyhow::Result<Arc<fx_paper_market::IngestionService>> {
    let provider = fx_paper_market::build_provider(&config.market_data)?;
    Ok(Arc::new(fx_paper_market::IngestionService::new(
        provider,
        config.market_data.clone(),
    )))
}

fn serde_pretty<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
