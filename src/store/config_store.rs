use super::MemoryCache;
use crate::metrics::Metrics;
use crate::router::RedirectsConfig;
use crate::runtime::{Runtime, UpstreamRequest};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a rule document load was satisfied from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Fresh in-process copy
    Memory,
    /// Platform cache
    Cache,
    Network,
    /// Expired in-process copy served after every refresh path failed
    Stale,
}

impl ConfigSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSource::Memory => "memory",
            ConfigSource::Cache => "cache",
            ConfigSource::Network => "network",
            ConfigSource::Stale => "stale",
        }
    }
}

/// Layered loader for the remote rule document.
///
/// Lookup order is fresh memory, platform cache, network, then any expired
/// memory copy. Loading never fails; `None` means no layer had a parseable
/// document.
#[derive(Debug)]
pub struct ConfigStore {
    memory: MemoryCache,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl ConfigStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(),
            ttl,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Deadline for one network fetch; expiry counts as a failed fetch
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub async fn load(&self, url: &str, runtime: &Runtime) -> Option<RedirectsConfig> {
        self.load_with_source(url, runtime)
            .await
            .map(|(config, _)| config)
    }

    pub async fn load_with_source(
        &self,
        url: &str,
        runtime: &Runtime,
    ) -> Option<(RedirectsConfig, ConfigSource)> {
        let loaded = self.load_layers(url, runtime).await;
        match &loaded {
            Some((_, source)) => {
                debug!("Loaded rule document from {} ({})", url, source.as_str());
                Metrics::record_config_load(source.as_str());
            }
            None => {
                warn!("No rule document available for {}", url);
                Metrics::record_config_load("none");
            }
        }
        loaded
    }

    async fn load_layers(
        &self,
        url: &str,
        runtime: &Runtime,
    ) -> Option<(RedirectsConfig, ConfigSource)> {
        let now = runtime.now_millis();

        if let Some(entry) = self.memory.get_fresh(url, now) {
            match RedirectsConfig::parse(&entry.raw_text) {
                Ok(config) => return Some((config, ConfigSource::Memory)),
                Err(e) => warn!("Cached rule document for {} is invalid: {}", url, e),
            }
        }

        if let Some(cache) = &runtime.cache {
            match cache.get(url).await {
                Ok(Some(body)) => {
                    let text: Arc<str> = Arc::from(String::from_utf8_lossy(&body));
                    match RedirectsConfig::parse(&text) {
                        Ok(config) => {
                            self.memory.set(url, text, self.expiry(now));
                            return Some((config, ConfigSource::Cache));
                        }
                        Err(e) => warn!("Platform cache entry for {} is invalid: {}", url, e),
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Platform cache read failed for {}: {}", url, e),
            }
        }

        if let Some(config) = self.fetch(url, runtime, now).await {
            return Some((config, ConfigSource::Network));
        }

        let stale = self.memory.get_any(url)?;
        match RedirectsConfig::parse(&stale.raw_text) {
            Ok(config) => Some((config, ConfigSource::Stale)),
            Err(_) => None,
        }
    }

    async fn fetch(&self, url: &str, runtime: &Runtime, now: u64) -> Option<RedirectsConfig> {
        let request = runtime.fetcher.fetch(UpstreamRequest::get(url));
        let response = match timeout(self.fetch_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Failed to fetch rule document from {}: {}", url, e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Rule document fetch from {} timed out after {:?}",
                    url, self.fetch_timeout
                );
                return None;
            }
        };

        if !response.status.is_success() {
            warn!(
                "Rule document fetch from {} returned {}",
                url, response.status
            );
            return None;
        }

        let text: Arc<str> = Arc::from(String::from_utf8_lossy(&response.body));
        let config = match RedirectsConfig::parse(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!("Rule document from {} is not valid JSON: {}", url, e);
                return None;
            }
        };

        self.memory.set(url, text.clone(), self.expiry(now));
        self.store_in_platform_cache(url, text, runtime).await;

        Some(config)
    }

    async fn store_in_platform_cache(&self, url: &str, text: Arc<str>, runtime: &Runtime) {
        let Some(cache) = runtime.cache.clone() else {
            return;
        };
        let key = url.to_string();
        let body = Bytes::copy_from_slice(text.as_bytes());
        let ttl = self.ttl;

        let write = async move {
            if let Err(e) = cache.put(&key, body, ttl).await {
                warn!("Platform cache write failed for {}: {}", key, e);
            }
        };

        match &runtime.background {
            Some(background) => background.spawn(Box::pin(write)),
            None => write.await,
        }
    }

    fn expiry(&self, now: u64) -> u64 {
        now.saturating_add(self.ttl.as_millis() as u64)
    }
}
