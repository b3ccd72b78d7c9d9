use super::{ConfigCache, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Local in-memory platform cache for single-node deployments.
/// Entries honor the TTL they were stored with (`max-age` semantics).
pub struct LocalStore {
    entries: DashMap<String, LocalEntry>,
}

struct LocalEntry {
    body: Bytes,
    expires_at: Instant,
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigCache for LocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let now = Instant::now();
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now, entry.body.clone()));

        match lookup {
            Some((true, body)) => Ok(Some(body)),
            Some((false, _)) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, body: Bytes, ttl: Duration) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            LocalEntry {
                body,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = LocalStore::new();
        assert!(store.get("https://cfg/rules.json").await.unwrap().is_none());

        store
            .put("https://cfg/rules.json", Bytes::from_static(b"{}"), Duration::from_secs(60))
            .await
            .unwrap();

        let body = store.get("https://cfg/rules.json").await.unwrap();
        assert_eq!(body, Some(Bytes::from_static(b"{}")));
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted() {
        let store = LocalStore::new();
        store
            .put("k", Bytes::from_static(b"stale"), Duration::ZERO)
            .await
            .unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_entries() {
        let store = LocalStore::new();
        store.put("dead", Bytes::new(), Duration::ZERO).await.unwrap();
        store
            .put("live", Bytes::new(), Duration::from_secs(300))
            .await
            .unwrap();

        store.cleanup();
        assert_eq!(store.len(), 1);
    }
}
