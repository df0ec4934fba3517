//! Application configuration structures.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigError, expand_env_vars, is_valid_metric_name};
use crate::server::{DEFAULT_TIMEOUT_OFFSET, HEALTH_PATH};

// =============================================================================
// Constants
// =============================================================================

/// Default listen port.
pub const DEFAULT_PORT: u16 = 9104;

/// Default path serving the scrape endpoint.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default metric namespace.
pub const DEFAULT_NAMESPACE: &str = "fanout";

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9104).
    pub port: u16,

    /// Path under which to expose metrics (default: "/metrics").
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

// =============================================================================
// Scrape Configuration
// =============================================================================

/// Scrape behaviour shared by every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Prefix of every exported metric name (default: "fanout").
    pub namespace: String,

    /// Seconds subtracted from the Prometheus scrape timeout (default: 0.25).
    pub timeout_offset: f64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout_offset: DEFAULT_TIMEOUT_OFFSET,
        }
    }
}

// =============================================================================
// Log Configuration
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. "info" or "info,fanout_exporter=debug".
    pub level: String,

    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server configuration.
    pub server: ServerConfig,

    /// Scrape configuration.
    pub scrape: ScrapeConfig,

    /// Per-scraper overrides of the compiled-in enabled flag.
    pub collectors: BTreeMap<String, bool>,

    /// Logging configuration.
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&expand_env_vars(&content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if !self.server.metrics_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "metrics path must start with '/': '{}'",
                self.server.metrics_path
            )));
        }
        if self
            .server
            .metrics_path
            .contains([':', '*', '{', '}'])
        {
            return Err(ConfigError::ValidationError(format!(
                "metrics path must not contain route parameters: '{}'",
                self.server.metrics_path
            )));
        }
        if self.server.metrics_path == HEALTH_PATH {
            return Err(ConfigError::ValidationError(format!(
                "metrics path must not be '{HEALTH_PATH}'"
            )));
        }

        if self.scrape.namespace.is_empty() {
            return Err(ConfigError::ValidationError(
                "scrape namespace must not be empty".to_string(),
            ));
        }
        if !is_valid_metric_name(&self.scrape.namespace) {
            return Err(ConfigError::ValidationError(format!(
                "scrape namespace is not a valid metric name prefix: '{}'",
                self.scrape.namespace
            )));
        }

        let offset = self.scrape.timeout_offset;
        if !offset.is_finite() || offset < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "scrape timeout_offset must be a non-negative number of seconds, got {offset}"
            )));
        }

        Ok(())
    }

    /// Socket address the server binds to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.scrape.namespace, "fanout");
        assert_eq!(config.scrape.timeout_offset, 0.25);
        assert!(config.collectors.is_empty());
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  port: 9200
  metrics_path: /probe
scrape:
  timeout_offset: 0.5
collectors:
  ping: false
log:
  format: json
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.server.metrics_path, "/probe");
        assert_eq!(config.scrape.timeout_offset, 0.5);
        assert_eq!(config.scrape.namespace, "fanout");
        assert_eq!(config.collectors.get("ping"), Some(&false));
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/fanout.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "scrape:\n  timeout_offset: -1\n").unwrap();

        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("timeout_offset"));
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind = "not-an-ip".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_metrics_path() {
        let mut config = AppConfig::default();
        config.server.metrics_path = "metrics".to_string();
        assert!(config.validate().is_err());

        config.server.metrics_path = "/healthz".to_string();
        assert!(config.validate().is_err());

        for path in ["/:m", "/*m", "/{m}", "/metrics/{*rest}"] {
            config.server.metrics_path = path.to_string();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("route parameters"), "{path}: {err}");
        }

        config.server.metrics_path = "/probe/metrics".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_namespace() {
        let mut config = AppConfig::default();
        config.scrape.namespace = String::new();
        assert!(config.validate().is_err());

        config.scrape.namespace = "my-exporter".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("my-exporter"));

        config.scrape.namespace = "my_exporter".to_string();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_validated_namespace_renders() {
        use crate::collector::{Exporter, ExporterDescs, MetricSink, ScrapeContext};

        let mut config = AppConfig::default();
        config.scrape.namespace = "edge:fanout_2".to_string();
        config.validate().unwrap();

        let exporter = Exporter::new(ExporterDescs::new(&config.scrape.namespace), Vec::new());
        let (sink, stream) = MetricSink::channel();
        exporter.collect(&ScrapeContext::new(), &sink).await.unwrap();
        drop(sink);

        let text = crate::exposition::encode(&stream.drain()).unwrap();
        assert!(text.contains("edge:fanout_2_up 1"));
    }

    #[test]
    fn test_listen_addr() {
        let mut config = AppConfig::default();
        config.server.bind = "127.0.0.1".to_string();
        config.server.port = 9300;
        assert_eq!(
            config.listen_addr().unwrap(),
            "127.0.0.1:9300".parse().unwrap()
        );
    }
}
