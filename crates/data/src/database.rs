use fx_paper_core::{DatabaseConfig, EngineError, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Connects a Postgres pool using the configured URL and pool size.
///
/// # Errors
/// Returns `StoreUnavailable` if the database connection cannot be
/// established.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Applies the numbered migration series forward.
///
/// # Errors
/// Returns `StoreUnavailable` if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| EngineError::StoreUnavailable(format!("migration failed: {e}")))?;
    Ok(())
}
