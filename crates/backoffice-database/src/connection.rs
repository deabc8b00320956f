//! PostgreSQL pool backing the extension registry.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use backoffice_core::config::{DatabaseConfig, redact_url};
use backoffice_core::error::{AppError, ErrorKind};

/// Shared sqlx pool. Clones refer to the same connections.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Opens a pool sized and timed by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %redact_url(&config.url),
            max_connections = config.max_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to connect to database", e)
            })?;

        Ok(Self { pool })
    }

    /// The raw sqlx pool, for migrations.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Hands the pool to a repository.
    pub fn into_pool(self) -> PgPool {
        self.pool
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
