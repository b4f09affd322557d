//! Otelo: wiring an application to an observability pipeline.
//!
//! Counters, up/down counters and histograms are recorded through a generic
//! event model, aggregated once by the OpenTelemetry SDK, and exported two
//! ways: pushed to a collector over OTLP gRPC and pulled by Prometheus from
//! an HTTP scrape endpoint. Spans go out over the same OTLP channel.
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`event`]: Key/value events and typed metric front-ends
//! - [`instruments`]: Instrument registry and event adapter
//! - [`observability`]: Logging setup and the scrape endpoint
//! - [`sampler`]: Periodic synthetic load
//! - [`telemetry`]: Meter/tracer providers and their exporters

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // instruments::InstrumentRegistry is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod error;
pub mod event;
pub mod instruments;
pub mod observability;
pub mod sampler;
pub mod telemetry;

pub use error::{TelemetryError, TelemetryResult};
pub use telemetry::{PipelineState, Telemetry};
