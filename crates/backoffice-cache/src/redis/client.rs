//! Redis connection management.

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use backoffice_core::config::cache::RedisCacheConfig;
use backoffice_core::config::redact_url;
use backoffice_core::error::{AppError, ErrorKind};
use backoffice_core::result::AppResult;

/// A reconnecting Redis connection plus the namespace for our keys.
#[derive(Debug, Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisClient {
    /// Opens a connection manager for `config.url`.
    pub async fn connect(config: &RedisCacheConfig) -> AppResult<Self> {
        info!(url = %redact_url(&config.url), "Connecting to Redis");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Invalid Redis URL", e)
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to connect to Redis", e)
        })?;

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// A handle to the shared connection. Cloning is cheap.
    pub fn conn_mut(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// `key` inside this client's namespace.
    pub fn prefixed_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}
