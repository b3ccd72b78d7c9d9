mod handler;
mod listener;
pub mod response;

pub use handler::RequestHandler;
pub use listener::Listener;

use crate::config::Settings;
use crate::runtime::{HttpFetcher, Runtime, TokioBackground};
use crate::store::LocalStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

pub struct Server {
    settings: Settings,
    handler: Arc<RequestHandler>,
    cache: Arc<LocalStore>,
}

impl Server {
    /// Build the server with the default runtime: reqwest fetcher, in-process
    /// platform cache and tokio background writes
    pub fn new(settings: Settings) -> Result<Self> {
        let fetcher = HttpFetcher::new(settings.upstream.timeout.as_std())
            .context("Failed to build upstream HTTP client")?;
        let cache = Arc::new(LocalStore::new());

        let runtime = Runtime::new(Arc::new(fetcher))
            .with_cache(cache.clone())
            .with_background(Arc::new(TokioBackground));

        let handler = Arc::new(RequestHandler::new(&settings, runtime));

        Ok(Self {
            settings,
            handler,
            cache,
        })
    }

    pub fn handler(&self) -> Arc<RequestHandler> {
        Arc::clone(&self.handler)
    }

    pub async fn run(&self) -> Result<()> {
        let address = self.settings.listen_addr()?;
        info!("Rule document source: {}", self.handler.config_url());

        let listener = Listener::new(address, self.handler());
        let listener_handle = tokio::spawn(async move {
            if let Err(e) = listener.serve().await {
                error!("Listener error: {:#}", e);
            }
        });

        let cache = Arc::clone(&self.cache);
        let sweep_every = self.settings.redirects.cache_ttl.as_std();
        let cleanup_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_every);
            interval.tick().await;
            loop {
                interval.tick().await;
                cache.cleanup();
            }
        });

        info!("Server started, waiting for shutdown signal");

        // Wait for shutdown signal
        shutdown_signal().await;

        info!("Shutdown signal received, stopping server");

        cleanup_handle.abort();
        listener_handle.abort();

        info!("Server stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
