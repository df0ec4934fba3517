//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (bind address, port, metrics path)
//! - Scrape settings (metric namespace, timeout offset)
//! - Per-scraper enable/disable overrides
//! - Logging (level, format)
//!
//! Every setting has a default, so the file is optional. CLI flags override
//! values read from the file.

mod app;
mod validation;

pub use app::{AppConfig, LogConfig, LogFormat, ScrapeConfig, ServerConfig};
pub use app::{DEFAULT_METRICS_PATH, DEFAULT_NAMESPACE, DEFAULT_PORT};
pub use validation::{ConfigError, expand_env_vars, is_valid_metric_name, parse_collector_toggle};
