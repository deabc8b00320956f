//! Redis cache provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use backoffice_core::error::{AppError, ErrorKind};
use backoffice_core::result::AppResult;
use backoffice_core::traits::cache::CacheProvider;

use super::client::RedisClient;

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 200;

/// Provider backed by a shared Redis instance.
#[derive(Debug, Clone)]
pub struct RedisCacheProvider {
    client: RedisClient,
}

impl RedisCacheProvider {
    /// Wraps a connected client.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Every prefixed key matching `pattern`, walked with `SCAN` so the
    /// server is never blocked.
    async fn scan(&self, pattern: &str) -> AppResult<Vec<String>> {
        let mut conn = self.client.conn_mut();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;

            keys.extend(batch);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

fn redis_error(e: redis::RedisError) -> AppError {
    AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.client.conn_mut();
        conn.get(self.client.prefixed_key(key))
            .await
            .map_err(redis_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        // SETEX rejects a zero TTL.
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(self.client.prefixed_key(key), value, seconds)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let _: () = conn
            .del(self.client.prefixed_key(key))
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        let keys = self.scan(&self.client.prefixed_key(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.client.conn_mut();
        let count: u64 = conn.del(&keys).await.map_err(redis_error)?;

        debug!(pattern, count, "Deleted keys matching pattern");
        Ok(count)
    }
}
