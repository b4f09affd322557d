//! OTLP gRPC exporters for the push path.
//!
//! Channels are plaintext unless a CA certificate is supplied. Retry and
//! backoff are left to the exporter transport.

use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig, WithTonicConfig};
use std::path::Path;
use tonic::transport::{Certificate, ClientTlsConfig};

use crate::error::{TelemetryError, TelemetryResult};

/// Load TLS settings for the collector channel.
///
/// Returns `None` when no CA certificate is configured.
pub fn tls_config(ca_cert: Option<&Path>) -> TelemetryResult<Option<ClientTlsConfig>> {
    let Some(path) = ca_cert else {
        return Ok(None);
    };

    let pem = std::fs::read(path)?;
    if pem.is_empty() {
        return Err(TelemetryError::Config(format!(
            "CA certificate {} is empty",
            path.display()
        )));
    }

    Ok(Some(
        ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem)),
    ))
}

/// Build the OTLP metric exporter. Must be called inside a tokio runtime.
pub fn metric_exporter(
    endpoint: &str,
    tls: Option<ClientTlsConfig>,
) -> TelemetryResult<MetricExporter> {
    let mut builder = MetricExporter::builder().with_tonic().with_endpoint(endpoint);
    if let Some(tls) = tls {
        builder = builder.with_tls_config(tls);
    }

    builder
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))
}

/// Build the OTLP span exporter. Must be called inside a tokio runtime.
pub fn span_exporter(endpoint: &str, tls: Option<ClientTlsConfig>) -> TelemetryResult<SpanExporter> {
    let mut builder = SpanExporter::builder().with_tonic().with_endpoint(endpoint);
    if let Some(tls) = tls {
        builder = builder.with_tls_config(tls);
    }

    builder
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))
}
