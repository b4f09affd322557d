//! Typed instruments, the lazily populated registry that owns them, and the
//! adapter that routes generic events onto them.

pub mod adapter;
pub mod error;
pub mod registry;

pub use adapter::{labels_to_attributes, Handled, MetricHandler};
pub use error::{AdaptError, RegistryError};
pub use registry::InstrumentRegistry;

use opentelemetry::metrics::{self, Meter};
use opentelemetry::KeyValue;
use std::fmt;

use crate::event::MetricValue;

/// The instrument families an event can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Monotonic integer sum.
    Counter,
    /// Non-monotonic floating point sum.
    UpDownCounter,
    /// Integer distribution; durations are recorded in nanoseconds.
    Histogram,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Counter => "counter",
            Self::UpDownCounter => "up/down counter",
            Self::Histogram => "histogram",
        };
        f.write_str(name)
    }
}

/// Descriptive options applied when an instrument is first created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InstrumentOptions {
    pub description: String,
    pub unit: String,
    pub namespace: Option<String>,
}

impl InstrumentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// The exported instrument name: `{namespace}_{name}`, or `name` alone.
    pub fn qualified_name(&self, name: &str) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}_{name}"),
            _ => name.to_string(),
        }
    }
}

/// SDK instrument backing a registry entry.
enum Recorder {
    Counter(metrics::Counter<u64>),
    UpDownCounter(metrics::UpDownCounter<f64>),
    Histogram(metrics::Histogram<u64>),
}

/// A named, typed accumulator handle.
///
/// Accumulated state lives in the SDK; this handle only forwards values.
pub struct Instrument {
    name: String,
    kind: InstrumentKind,
    recorder: Recorder,
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Instrument {
    fn build(meter: &Meter, name: String, kind: InstrumentKind, options: &InstrumentOptions) -> Self {
        let description = options.description.clone();
        let unit = options.unit.clone();
        let recorder = match kind {
            InstrumentKind::Counter => Recorder::Counter(
                meter
                    .u64_counter(name.clone())
                    .with_description(description)
                    .with_unit(unit)
                    .build(),
            ),
            InstrumentKind::UpDownCounter => Recorder::UpDownCounter(
                meter
                    .f64_up_down_counter(name.clone())
                    .with_description(description)
                    .with_unit(unit)
                    .build(),
            ),
            InstrumentKind::Histogram => Recorder::Histogram(
                meter
                    .u64_histogram(name.clone())
                    .with_description(description)
                    .with_unit(unit)
                    .build(),
            ),
        };

        Self { name, kind, recorder }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    /// Forward a value to the SDK accumulator.
    ///
    /// Counters take non-negative integers, up/down counters take floats or
    /// integers, histograms take durations or non-negative integers.
    pub fn record(&self, value: MetricValue, attributes: &[KeyValue]) -> Result<(), AdaptError> {
        match (&self.recorder, value) {
            (Recorder::Counter(c), MetricValue::Int(n)) if n >= 0 => c.add(n.unsigned_abs(), attributes),
            (Recorder::UpDownCounter(c), MetricValue::Float(f)) => c.add(f, attributes),
            #[allow(clippy::cast_precision_loss)]
            (Recorder::UpDownCounter(c), MetricValue::Int(n)) => c.add(n as f64, attributes),
            (Recorder::Histogram(h), MetricValue::Duration(d)) => {
                h.record(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX), attributes);
            }
            (Recorder::Histogram(h), MetricValue::Int(n)) if n >= 0 => h.record(n.unsigned_abs(), attributes),
            _ => {
                return Err(AdaptError::ValueMismatch {
                    metric: self.name.clone(),
                    kind: self.kind,
                    value,
                })
            }
        }
        Ok(())
    }
}
