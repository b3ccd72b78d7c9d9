pub mod duration;
pub mod env;
mod types;

pub use duration::Duration;
pub use env::{resolve_config_url, Bindings};
pub use types::*;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;

const MAX_REDIRECT_LIMIT: u32 = 20;

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;

        let settings: Settings =
            serde_yml::from_str(&content).with_context(|| "Failed to parse settings file")?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn bindings(&self) -> Bindings {
        Bindings::new(self.bindings.clone())
    }

    /// URL of the redirect rule document for this deployment
    pub fn config_url(&self) -> String {
        resolve_config_url(&self.bindings(), &self.redirects)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen))
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if self.redirects.cache_ttl.is_zero() {
            anyhow::bail!("redirects.cache_ttl must be greater than zero");
        }

        if self.upstream.timeout.is_zero() {
            anyhow::bail!("upstream.timeout must be greater than zero");
        }

        if self.upstream.max_redirects > MAX_REDIRECT_LIMIT {
            anyhow::bail!(
                "upstream.max_redirects must be at most {} (got {})",
                MAX_REDIRECT_LIMIT,
                self.upstream.max_redirects
            );
        }

        let config_url = self.config_url();
        let parsed = url::Url::parse(&config_url)
            .with_context(|| format!("Invalid redirects config URL: {}", config_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Redirects config URL must be http(s): {}", config_url);
        }

        if let Some(metrics) = &self.metrics {
            metrics
                .address
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid metrics address: {}", metrics.address))?;
        }

        Ok(())
    }
}
