//! Configuration parsing for the otelo service.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Otelo: metrics and traces over OTLP push and Prometheus pull.
#[derive(Parser, Debug, Clone)]
#[command(name = "otelo")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Service name attached to every exported data point
    #[arg(long, env = "OTELO_SERVICE_NAME", default_value = "otelo")]
    pub service_name: String,

    /// Deployment environment attached to every exported data point
    #[arg(long, env = "OTELO_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Extra resource attributes (key=value, repeatable)
    #[arg(long = "resource-attr", env = "OTELO_RESOURCE_ATTRS", value_delimiter = ',')]
    pub resource_attrs: Vec<ResourceAttr>,

    /// OpenTelemetry collector endpoint for OTLP export (push path disabled when unset)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// PEM CA certificate enabling TLS on the OTLP channel (plaintext when unset)
    #[arg(long, env = "OTELO_OTLP_CA_CERT")]
    pub otlp_ca_cert: Option<PathBuf>,

    /// Interval between OTLP metric pushes, in seconds
    #[arg(long, env = "OTELO_EXPORT_INTERVAL_SECS", default_value_t = 10)]
    pub export_interval_secs: u64,

    /// Host address the scrape endpoint binds to
    #[arg(long, env = "OTELO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the scrape endpoint listens on
    #[arg(short = 'p', long, env = "OTELO_METRICS_PORT", default_value_t = 8000)]
    pub metrics_port: u16,

    /// Sampler tick period, in milliseconds
    #[arg(long, env = "OTELO_SAMPLE_INTERVAL_MS", default_value_t = 1000)]
    pub sample_interval_ms: u64,

    /// Stop the sampler after this many ticks (unbounded when unset)
    #[arg(long, env = "OTELO_MAX_SAMPLES")]
    pub max_samples: Option<u64>,

    /// Shut the whole service down once the sampler stops on its own
    #[arg(long, env = "OTELO_EXIT_AFTER_SAMPLES", default_value_t = false)]
    pub exit_after_samples: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "OTELO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Output format of the console log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// A single `key=value` resource attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAttr {
    pub key: String,
    pub value: String,
}

impl FromStr for ResourceAttr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("empty attribute key in {s:?}"));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Socket address of the scrape endpoint.
    pub fn metrics_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.metrics_port).parse()
    }

    pub fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Create a default configuration for testing.
    pub fn test_config() -> Self {
        Self {
            service_name: "otelo-test".into(),
            environment: "test".into(),
            host: "127.0.0.1".into(),
            metrics_port: 0, // Random port
            log_level: "debug".into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "otelo".into(),
            environment: "development".into(),
            resource_attrs: Vec::new(),
            otlp_endpoint: None,
            otlp_ca_cert: None,
            export_interval_secs: 10,
            host: "0.0.0.0".into(),
            metrics_port: 8000,
            sample_interval_ms: 1000,
            max_samples: None,
            exit_after_samples: false,
            log_level: "info".into(),
            log_format: LogFormat::Pretty,
        }
    }
}
