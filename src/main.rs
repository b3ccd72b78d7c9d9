use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use edgeroute::{config::Settings, metrics, server::Server};

#[derive(Parser, Debug)]
#[command(name = "edgeroute")]
#[command(about = "Edge router serving redirects and proxies from a remote rule set")]
#[command(version)]
struct Args {
    /// Path to settings file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Validate settings and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading settings from {:?}", path);
            Settings::load(path)?
        }
        None => {
            info!("No settings file given, using defaults");
            Settings::default()
        }
    };

    if let Some(listen) = args.listen {
        settings.listen = listen;
    }
    settings.validate()?;

    if args.validate {
        info!("Settings are valid (rules from {})", settings.config_url());
        return Ok(());
    }

    // Start metrics server if configured
    if let Some(ref metrics_config) = settings.metrics {
        info!("Starting Prometheus metrics server on {}", metrics_config.address);
        if let Err(e) = metrics::start_metrics_server(&metrics_config.address) {
            warn!("Failed to start metrics server: {}. Continuing without metrics.", e);
        }
    }

    info!("Starting edgeroute server");

    let server = Server::new(settings)?;
    server.run().await?;

    Ok(())
}
