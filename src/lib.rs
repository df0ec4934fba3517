//! Fanout Exporter - On-demand Prometheus Scrape Orchestration
//!
//! This crate provides the core functionality for the fanout exporter. It can
//! be embedded by other Rust projects that bring their own scrapers, or run as
//! a standalone binary with the `fanout-exporter` executable.
//!
//! # Architecture
//!
//! - **Collectors**: The [`Scraper`] trait, the scraper registry and the
//!   concurrent [`Exporter`] that runs a request's scrapers under one deadline
//! - **Exposition**: Prometheus text rendering of a request's samples
//! - **Server**: Axum routes for the scrape endpoint, health and landing page
//! - **Config**: YAML configuration with CLI overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use fanout_exporter::{AppConfig, AppState, ScraperRegistry, create_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let scrapers = ScraperRegistry::builtin(&config.scrape.namespace)
//!         .resolve(&BTreeMap::new())?;
//!
//!     let router = create_router(
//!         AppState::new(&config.scrape, scrapers),
//!         &config.server.metrics_path,
//!     )?;
//!     let listener = tokio::net::TcpListener::bind(config.listen_addr()?).await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod exposition;
pub mod server;

pub use collector::{
    EnabledScrapers, Exporter, ExporterDescs, MetricDesc, MetricSink, Sample, ScrapeContext,
    ScrapeError, Scraper, ScraperRegistry,
};
pub use config::{AppConfig, ConfigError};
pub use exposition::ExpositionError;
pub use server::{AppState, create_router};
