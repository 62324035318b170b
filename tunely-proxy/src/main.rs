//! tunely-proxy - music search and audio streaming proxy
//!
//! Serves `/search`, `/info/:id` and `/stream/:id`, backed by an upstream
//! search provider and one extraction subprocess per stream.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tunely_common::config::{load_toml_config, ConfigFileResolver, ConfigSource, CONFIG_ENV_VAR};

use tunely_proxy::api::buildinfo::BuildInfo;
use tunely_proxy::config::{ProxyConfig, SearchProviderKind, MODULE_NAME};
use tunely_proxy::logging::init_tracing;
use tunely_proxy::AppState;

/// Command-line arguments for tunely-proxy
#[derive(Parser, Debug)]
#[command(name = "tunely-proxy")]
#[command(about = "Music search aggregation and audio streaming proxy")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long, env = "TUNELY_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TUNELY_PORT")]
    port: Option<u16>,

    /// Externally reachable base URL used in stream URLs
    #[arg(long, env = "TUNELY_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Extraction tool executable
    #[arg(long, env = "TUNELY_EXTRACTOR")]
    extractor: Option<PathBuf>,

    /// Search provider (ytdlp or invidious)
    #[arg(long, env = "TUNELY_SEARCH_PROVIDER")]
    provider: Option<SearchProviderKind>,

    /// Log level or filter directive (RUST_LOG still wins)
    #[arg(long, env = "TUNELY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.public_base_url {
            config.server.public_base_url = Some(url);
        }
        if let Some(program) = self.extractor {
            config.extractor.program = program;
        }
        if let Some(provider) = self.provider {
            config.search.provider = provider;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Tracing is not up yet, so config errors surface through anyhow
    let config_path = ConfigFileResolver::new(MODULE_NAME).resolve(args.config.as_deref());
    let loaded = load_toml_config::<ProxyConfig>(config_path.as_deref())
        .context("Failed to load configuration")?;
    let source = loaded.source;
    let mut config = loaded.config;
    args.apply(&mut config);

    init_tracing(&config.logging).context("Failed to initialize logging")?;

    let build = BuildInfo::current();
    info!(
        "Starting {} v{} [{}] built {} ({})",
        MODULE_NAME, build.version, build.git_hash, build.build_timestamp, build.build_profile
    );

    match &source {
        ConfigSource::File(path) => info!("Configuration: {}", path.display()),
        ConfigSource::Missing(path) => warn!(
            "Config file {} not found, using defaults",
            path.display()
        ),
        ConfigSource::Defaults => info!("No config file, using defaults"),
    }

    let state = AppState::from_config(&config).context("Failed to initialize search provider")?;
    let app = tunely_proxy::build_router(state);

    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    info!("Listening on http://{}", bind_address);
    info!("Public base URL: {}", config.server.public_base_url());
    info!("Extraction tool: {}", config.extractor.program_name());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
