pub mod postgres;

pub use postgres::{PostgresChannelRepository, PostgresJobRepository, PostgresWorkerRepository};

use std::time::Duration;

use harvester_config::DatabaseConfig;
use harvester_errors::{HarvesterError, HarvesterResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Build a connection pool from configuration.
pub async fn create_pool(config: &DatabaseConfig) -> HarvesterResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await
        .map_err(HarvesterError::Database)?;

    info!(
        max_connections = config.max_connections,
        "database pool established"
    );

    Ok(pool)
}

/// Apply pending migrations from the bundled migrations directory.
pub async fn run_migrations(pool: &PgPool) -> HarvesterResult<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| HarvesterError::DatabaseOperation(format!("migration failed: {e}")))?;
    info!("database migrations applied");
    Ok(())
}
