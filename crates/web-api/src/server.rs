use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Control surface over the engine services.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Builds the router with all API routes.
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/v1/candles/latest", get(handlers::candles::latest))
            .route("/v1/candles", get(handlers::candles::history))
            .route("/v1/candles/integrity", get(handlers::candles::integrity))
            .route("/v1/candles/admin/ingest", post(handlers::candles::ingest))
            .route(
                "/v1/candles/admin/backfill",
                post(handlers::candles::backfill),
            )
            .route("/v1/candles/admin/prune", post(handlers::candles::prune))
            .route("/paper/order", post(handlers::orders::place))
            .route("/paper/orders", get(handlers::orders::list))
            .route("/paper/orders/:id", get(handlers::orders::get))
            .route("/paper/orders/:id/cancel", post(handlers::orders::cancel))
            .route("/v6/risk/status", get(handlers::risk::status))
            .route("/v6/risk/check", post(handlers::risk::check))
            .route("/v7/account/status", get(handlers::account::status))
            .route("/v7/account/recompute", post(handlers::account::recompute))
            .route("/orchestrator/run", post(handlers::orchestrator::run))
            .route("/orchestrator/runs", get(handlers::orchestrator::list))
            .route("/orchestrator/runs/:id", get(handlers::orchestrator::get))
            .route("/strategy/strategies", get(handlers::strategy::catalog))
            .route("/strategy/run", post(handlers::strategy::run))
            .with_state(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind or serve.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("control surface listening on {}", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
