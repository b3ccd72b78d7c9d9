mod config_store;
mod local;
mod memory;

pub use config_store::{ConfigSource, ConfigStore};
pub use local::LocalStore;
pub use memory::{CacheEntry, MemoryCache};

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Result type for cache operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Platform-level response cache keyed by URL.
///
/// This is the cache the hosting platform offers (shared, possibly
/// out-of-process); the in-process [`MemoryCache`] sits in front of it.
#[async_trait]
pub trait ConfigCache: Send + Sync {
    /// Cached body for `key`, if present and not expired
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Store `body` under `key` for `ttl`
    async fn put(&self, key: &str, body: Bytes, ttl: Duration) -> StoreResult<()>;
}
