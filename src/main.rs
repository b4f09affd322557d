//! Otelo: metrics and traces over OTLP push and Prometheus pull.
//!
//! # Usage
//!
//! ```bash
//! otelo --otlp-endpoint http://localhost:4317 --metrics-port 8000 --log-level info
//! ```
//!
//! Environment variables can also be used:
//! - `OTELO_SERVICE_NAME`: Service name resource attribute
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint (push path disabled when unset)
//! - `OTELO_METRICS_PORT`: Scrape endpoint port
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use otelo::config::Config;
use otelo::observability::prometheus::{run_prometheus_server, ScrapeState};
use otelo::observability::tracing::init_tracing;
use otelo::sampler::Sampler;
use otelo::telemetry::{TelemetryBuilder, INSTRUMENTATION_SCOPE};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  Otelo v{} - metrics & traces demo service

  Configuration:
    Service:    {} ({})
    Scrape:     http://{}:{}/metrics
    OTLP:       {}{}
    Sampling:   every {} ms

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.service_name,
        config.environment,
        config.host,
        config.metrics_port,
        config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        if config.otlp_endpoint.is_some() && config.otlp_ca_cert.is_none() {
            " (plaintext)"
        } else {
            ""
        },
        config.sample_interval_ms,
    );
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn wait_for_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {
                        tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating shutdown...");
                    }
                    () = token.cancelled() => return,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl+C only");
                tokio::select! {
                    _ = ctrl_c => tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown..."),
                    () = token.cancelled() => return,
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown..."),
            () = token.cancelled() => return,
        }
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Exporters first: an unbuildable pipeline aborts startup
    let telemetry = TelemetryBuilder::from_config(&config)
        .build()
        .context("failed to construct telemetry pipeline")?;

    // Initialize logging, bridging tracing spans into the tracer provider
    init_tracing(&config, Some(telemetry.tracer(INSTRUMENTATION_SCOPE)))?;
    tracing::info!(
        service = %config.service_name,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        tls = config.otlp_ca_cert.is_some(),
        export_interval_secs = config.export_interval_secs,
        push = telemetry.push_enabled(),
        "Telemetry pipeline ready"
    );

    print_banner(&config);

    let metrics_addr = config.metrics_addr().context("invalid scrape address")?;
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    tracker.spawn(wait_for_signal(cancel.clone()));

    let mut sampler = Sampler::new(
        telemetry.metric_handler(),
        telemetry.tracer("otelo.sampler"),
        config.sample_interval(),
    );
    if let Some(max) = config.max_samples {
        sampler = sampler.with_max_ticks(max);
    }
    let exit_after_samples = config.exit_after_samples;
    let sampler_cancel = cancel.clone();
    tracker.spawn(async move {
        let ticks = sampler.run(sampler_cancel.clone()).await;
        tracing::info!(ticks, "Sampler stopped");
        if exit_after_samples {
            sampler_cancel.cancel();
        }
    });
    tracker.close();

    let served = run_prometheus_server(
        metrics_addr,
        ScrapeState::new(telemetry.prometheus_registry()),
        cancel.clone(),
    )
    .await;

    // Stop background tasks, then flush exporters
    cancel.cancel();
    tracker.wait().await;
    // Provider shutdown blocks on the exporter tasks; keep it off the workers
    let flushed = tokio::task::spawn_blocking(move || telemetry.shutdown())
        .await
        .context("telemetry shutdown task panicked")?;
    // A failed final flush loses data but is not a failed shutdown
    if let Err(e) = flushed {
        tracing::warn!(error = %e, "Final telemetry flush failed");
    }
    served.context("scrape endpoint failed")?;

    tracing::info!("Otelo shutdown complete");
    Ok(())
}
