//! StyleTTS 2 launcher HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use audio_cache::{CacheBackend, select_cache_implementation};
use launcher_core::LauncherConfig;
use launcher_server::{AppState, LauncherServer, ServerSettings};
use runtime::logging::init_logging_from_config;
use runtime::{LauncherMetrics, SynthesisPipeline};

/// StyleTTS 2 launcher
#[derive(Debug, Parser)]
#[command(name = "styletts-launcher")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Audio cache backend
    #[arg(long)]
    cache_implementation: Option<CacheBackend>,

    /// HTTP server address [default: 0.0.0.0:6578]
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Base directory of the installation
    #[arg(long)]
    root_dir: Option<PathBuf>,

    /// Log level [default: info]
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Load the config file and apply command line overrides.
fn load_config(args: &Args) -> Result<LauncherConfig> {
    let mut config = match &args.config {
        Some(path) => LauncherConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LauncherConfig::default(),
    };

    if let Some(backend) = args.cache_implementation {
        config.cache.backend = backend.to_string();
    }
    if let Some(addr) = args.addr {
        config.server.host = addr.ip().to_string();
        config.server.port = addr.port();
    }
    if let Some(root) = &args.root_dir {
        config.paths.root_dir = root.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_from_config(&config.logging);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        root_dir = %config.paths.root_dir.display(),
        cache = %config.cache.backend,
        "Starting StyleTTS 2 launcher"
    );

    let metrics = if config.metrics.enabled {
        Some(LauncherMetrics::install().context("Failed to install metrics recorder")?)
    } else {
        None
    };

    let backend: CacheBackend = config.cache.backend.parse()?;
    let cache_dir = config
        .cache
        .dir
        .clone()
        .unwrap_or_else(|| config.paths.default_cache_dir());
    let cache = select_cache_implementation(backend, cache_dir)
        .context("Failed to create audio cache")?;

    let pipeline = Arc::new(SynthesisPipeline::new(&config, cache));
    pipeline
        .purge_orphans()
        .context("Failed to clear scratch directories")?;

    let settings = ServerSettings {
        addr,
        shutdown_timeout_secs: config.server.shutdown_timeout_secs,
    };
    let server = LauncherServer::new(settings, AppState::new(pipeline, metrics));

    server.run().await.context("Server failed")?;

    info!("Server shutdown complete");
    Ok(())
}
