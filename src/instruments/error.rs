//! Registry and adaptation errors.

use thiserror::Error;

use super::InstrumentKind;
use crate::event::MetricValue;

/// Errors raised by [`InstrumentRegistry`](super::InstrumentRegistry).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// The name is already registered as a different instrument kind.
    #[error("instrument {name:?} is registered as a {existing}, not a {requested}")]
    KindMismatch {
        name: String,
        existing: InstrumentKind,
        requested: InstrumentKind,
    },

    /// The owning pipeline has been shut down.
    #[error("instrument registry is closed")]
    Closed,
}

/// Reasons a metric event could not be recorded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdaptError {
    #[error("metric event carries no metric descriptor")]
    MissingMetric,

    #[error("metric event for {metric:?} carries no value")]
    MissingValue { metric: String },

    #[error("value {value:?} cannot be recorded on {metric:?} ({kind})")]
    ValueMismatch {
        metric: String,
        kind: InstrumentKind,
        value: MetricValue,
    },

    #[error("label {name:?} cannot be converted to an attribute: {reason}")]
    UnconvertibleLabel { name: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AdaptError {
    /// Short machine-readable reason, used as the dropped-event label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingMetric => "missing_metric",
            Self::MissingValue { .. } => "missing_value",
            Self::ValueMismatch { .. } => "value_mismatch",
            Self::UnconvertibleLabel { .. } => "unconvertible_label",
            Self::Registry(RegistryError::KindMismatch { .. }) => "kind_mismatch",
            Self::Registry(RegistryError::Closed) => "closed",
        }
    }
}
