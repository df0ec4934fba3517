//! Fanout Exporter Binary Entry Point
//!
//! This binary serves the scrape endpoint over HTTP.
//! Core functionality is provided by the `fanout_exporter` library crate.

use clap::Parser;
use fanout_exporter::{
    collector::ScraperRegistry,
    config::{AppConfig, LogConfig, LogFormat, parse_collector_toggle},
    server::{AppState, create_router},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Fanout Exporter - concurrent on-demand Prometheus scrapes
#[derive(Parser, Debug)]
#[command(name = "fanout-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (optional, defaults apply without one)
    #[arg(short, long = "config.file", env = "FANOUT_CONFIG")]
    config: Option<String>,

    /// Server bind address (overrides config file)
    #[arg(long = "web.listen-address", env = "FANOUT_LISTEN_ADDRESS")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long = "web.listen-port", env = "FANOUT_LISTEN_PORT")]
    server_port: Option<u16>,

    /// Path under which to expose metrics (overrides config file)
    #[arg(long = "web.metrics-path")]
    metrics_path: Option<String>,

    /// Seconds to subtract from the Prometheus scrape timeout
    #[arg(long = "timeout-offset")]
    timeout_offset: Option<f64>,

    /// Enable or disable a scraper, e.g. `--collect ping=false` (repeatable)
    #[arg(long = "collect", value_name = "SCRAPER=BOOL", value_parser = parse_collector_toggle)]
    collect: Vec<(String, bool)>,

    /// Log filter directive (overrides config file, `RUST_LOG` wins over both)
    #[arg(long = "log.level")]
    log_level: Option<String>,

    /// Log output format (overrides config file)
    #[arg(long = "log.format", value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration, falling back to defaults without a file
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    if let Some(path) = cli.metrics_path {
        config.server.metrics_path = path;
    }
    if let Some(offset) = cli.timeout_offset {
        config.scrape.timeout_offset = offset;
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }
    config.collectors.extend(cli.collect);
    config.validate()?;

    init_tracing(&config.log);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting {}",
        env!("CARGO_PKG_NAME")
    );
    if let Some(path) = &cli.config {
        tracing::info!("Loaded configuration from: {}", path);
    }

    // Freeze the enabled scraper set for the life of the process
    let scrapers = ScraperRegistry::builtin(&config.scrape.namespace).resolve(&config.collectors)?;
    for name in scrapers.names() {
        tracing::info!(scraper = %name, "Scraper enabled");
    }
    if scrapers.is_empty() {
        tracing::warn!("No scrapers enabled, scrapes will only report liveness");
    }

    let router = create_router(
        AppState::new(&config.scrape, scrapers),
        &config.server.metrics_path,
    )?;

    let addr = config.listen_addr()?;
    tracing::info!(
        timeout_offset = config.scrape.timeout_offset,
        "Listening on: http://{}{}",
        addr,
        config.server.metrics_path
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);

    match log.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
