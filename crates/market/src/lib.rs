pub mod broker;
pub mod ingest;
pub mod integrity;
pub mod mock;
pub mod provider;
pub mod retention;

pub use broker::BrokerProvider;
pub use ingest::{IngestReport, IngestionService};
pub use integrity::{check_integrity, IntegrityReport, MissingRange};
pub use mock::MockProvider;
pub use provider::{build_provider, MarketDataProvider, RawCandle};
pub use retention::{prune_candles, PruneReport};
