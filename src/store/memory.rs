use dashmap::DashMap;
use std::sync::Arc;

/// Raw rule document plus the instant (epoch millis) it stops being fresh
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub raw_text: Arc<str>,
    pub expires_at: u64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_millis: u64) -> bool {
        self.expires_at > now_millis
    }
}

/// In-process cache of rule documents, keyed by config URL.
///
/// Expired entries are never evicted: they remain available as the
/// last known-good fallback when a refresh fails.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `url` only if it has not expired
    pub fn get_fresh(&self, url: &str, now_millis: u64) -> Option<CacheEntry> {
        self.entries
            .get(url)
            .filter(|entry| entry.value().is_fresh(now_millis))
            .map(|entry| entry.value().clone())
    }

    /// Entry for `url` regardless of expiry
    pub fn get_any(&self, url: &str) -> Option<CacheEntry> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    pub fn set(&self, url: &str, raw_text: Arc<str>, expires_at: u64) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                raw_text,
                expires_at,
            },
        );
    }
}
