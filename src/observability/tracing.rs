//! Structured logging setup.
//!
//! Configures:
//! - Console logging, pretty or JSON
//! - Environment-based filter (via RUST_LOG / `--log-level`)
//! - Optional bridge exporting `tracing` spans through the OpenTelemetry tracer

use opentelemetry_sdk::trace::Tracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};
use crate::error::{TelemetryError, TelemetryResult};

const DEFAULT_FILTER: &str = "info,otelo=debug";

/// Initialize the global `tracing` subscriber.
///
/// # Arguments
///
/// * `config` - Supplies the filter directive and output format
/// * `tracer` - When set, `tracing` spans are also exported as OTel spans
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &Config, tracer: Option<Tracer>) -> TelemetryResult<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|e| {
        eprintln!("invalid log filter {:?} ({e}), using {DEFAULT_FILTER}", config.log_level);
        EnvFilter::new(DEFAULT_FILTER)
    });

    let (pretty, json) = match config.log_format {
        LogFormat::Pretty => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            ),
        ),
    };

    let otel = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(filter)
        .with(otel)
        .with(pretty)
        .with(json)
        .try_init()
        .map_err(|e| TelemetryError::Config(format!("tracing already initialized: {e}")))?;

    tracing::info!(
        service = %config.service_name,
        format = ?config.log_format,
        "Tracing initialized"
    );
    Ok(())
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
