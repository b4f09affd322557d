//! Error types for telemetry pipeline setup and teardown.

use thiserror::Error;

/// Result type alias for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry error types
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Exporter could not be constructed
    #[error("Exporter error: {0}")]
    Exporter(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Flushing or shutting down a provider failed
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// Reading a certificate or binding a socket failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
