use super::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub redirects: RedirectsSource,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub canonical: CanonicalConfig,

    /// Explicit binding variables, consulted before the process environment
    #[serde(default)]
    pub bindings: HashMap<String, String>,

    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            redirects: RedirectsSource::default(),
            upstream: UpstreamConfig::default(),
            canonical: CanonicalConfig::default(),
            bindings: HashMap::new(),
            metrics: None,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

/// Where the redirect rule document lives and how long it is cached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectsSource {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub repo: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: Duration,
}

impl Default for RedirectsSource {
    fn default() -> Self {
        Self {
            url: None,
            repo: None,
            branch: None,
            path: None,
            cache_ttl: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Deadline for one proxy dispatch, redirect hops included
    #[serde(default = "default_upstream_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: default_upstream_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_redirects() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalConfig {
    #[serde(default = "default_true")]
    pub enforce_https: bool,

    #[serde(default = "default_true")]
    pub strip_www: bool,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            enforce_https: true,
            strip_www: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}
