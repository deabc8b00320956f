//! Cache manager that dispatches to the configured provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use backoffice_core::config::cache::CacheConfig;
use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;
use backoffice_core::traits::cache::CacheProvider;

/// Memoizes JSON values in the configured provider.
///
/// The cache is an accelerator only. Backend failures are logged and the
/// caller falls back to the source of truth; they never fail an operation.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<dyn CacheProvider>,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let inner: Arc<dyn CacheProvider> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis cache provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisCacheProvider::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory cache provider");
                Arc::new(crate::memory::MemoryCacheProvider::new(&config.memory))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a cache manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self { inner: provider }
    }

    /// Return the cached value for `key`, or compute it with `producer`
    /// and store it for `ttl`.
    ///
    /// An unreadable entry is recomputed. A producer error is propagated
    /// and nothing is stored.
    pub async fn remember_json<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match self.inner.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "Cached value unreadable, recomputing"),
            },
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "Cache read failed, recomputing"),
        }

        let value = producer().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.inner.set(key, &raw, ttl).await {
                    warn!(key, error = %e, "Failed to store cached value");
                }
            }
            Err(e) => warn!(key, error = %e, "Value not cacheable"),
        }

        Ok(value)
    }

    /// Drop `key` now. Failures are logged, never returned.
    pub async fn forget(&self, key: &str) {
        if let Err(e) = self.inner.delete(key).await {
            warn!(key, error = %e, "Failed to invalidate cache key");
        }
    }

    /// Drop every key matching `pattern`. Failures are logged.
    pub async fn forget_pattern(&self, pattern: &str) -> u64 {
        match self.inner.delete_pattern(pattern).await {
            Ok(count) => count,
            Err(e) => {
                warn!(pattern, error = %e, "Failed to invalidate cache pattern");
                0
            }
        }
    }
}
