//! Storage backend behind the extension cache.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// A string key/value store with per-entry expiry.
///
/// Values are opaque strings (the cache manager stores JSON). Keys are
/// passed through unprefixed; a backend that shares its keyspace adds its
/// own namespace.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Value stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Removes every key matching a trailing-`*` glob such as
    /// `extensions:derived:*`, returning how many went.
    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64>;
}
