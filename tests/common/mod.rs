//! Test utilities and server harness for otelo tests.
//!
//! Provides:
//! - In-process telemetry pipeline with a live scrape endpoint
//! - Minimal HTTP client for `GET /metrics`

#![allow(dead_code)]

use otelo::config::Config;
use otelo::instruments::MetricHandler;
use otelo::observability::prometheus::{bind, serve, ScrapeState};
use otelo::observability::tracing::init_test_tracing;
use otelo::telemetry::TelemetryBuilder;
use otelo::Telemetry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A telemetry pipeline serving its scrape endpoint on a random local port.
pub struct TestServer {
    pub telemetry: Telemetry,
    pub addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<otelo::TelemetryResult<()>>,
}

impl TestServer {
    /// Build a pull-only pipeline and start serving it.
    pub async fn start() -> Self {
        init_test_tracing();

        let config = Config::test_config();
        let telemetry = TelemetryBuilder::from_config(&config)
            .build()
            .expect("failed to build telemetry");

        let listener = bind(config.metrics_addr().expect("invalid scrape address"))
            .await
            .expect("failed to bind scrape endpoint");
        let addr = listener.local_addr().expect("no local addr");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(serve(
            listener,
            ScrapeState::new(telemetry.prometheus_registry()),
            cancel.clone(),
        ));

        Self {
            telemetry,
            addr,
            cancel,
            handle,
        }
    }

    pub fn handler(&self) -> Arc<MetricHandler> {
        self.telemetry.metric_handler()
    }

    /// Issue `GET {path}` and return (status code, body).
    pub async fn get(&self, path: &str) -> (u16, String) {
        self.request("GET", path).await
    }

    /// Issue a bodyless `{method} {path}` and return (status code, body).
    pub async fn request(&self, method: &str, path: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .expect("failed to connect");
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            self.addr
        );
        stream
            .write_all(request.as_bytes())
            .await
            .expect("failed to send request");

        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .await
            .expect("failed to read response");
        let raw = String::from_utf8(raw).expect("non-utf8 response");

        let status = raw
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("malformed status line");
        let body = raw
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (status, body)
    }

    /// `GET /metrics`, asserting success.
    pub async fn scrape(&self) -> String {
        let (status, body) = self.get("/metrics").await;
        assert_eq!(status, 200, "scrape failed: {body}");
        body
    }

    /// Stop the endpoint and close the pipeline.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server failed");
        self.telemetry.shutdown().expect("telemetry shutdown failed");
    }
}

/// Find the sample line for `metric` (ignoring `# HELP`/`# TYPE` lines) and
/// return its value.
pub fn sample_value(body: &str, metric: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find(|line| {
            line.strip_prefix(metric)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_value_parsing() {
        let body = "# HELP hits_total Earth meteorite hits\n\
                    # TYPE hits_total counter\n\
                    hits_total{otel_scope_name=\"otelo\"} 2\n\
                    hits_other_total 9\n";
        assert_eq!(sample_value(body, "hits_total"), Some(2.0));
        assert_eq!(sample_value(body, "hits_other_total"), Some(9.0));
        assert_eq!(sample_value(body, "misses_total"), None);
    }
}
