//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging with an optional OpenTelemetry span bridge
//! - HTTP endpoint for Prometheus scraping

pub mod prometheus;
pub mod tracing;
