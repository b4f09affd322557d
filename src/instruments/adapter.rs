//! Event adapter mapping generic metric events onto typed instruments.
//!
//! Adaptation failures never abort the process: [`MetricHandler::handle`]
//! logs the failure, counts it, and drops the event. Callers that want the
//! error use [`MetricHandler::try_handle`].

use opentelemetry::metrics::Counter;
use opentelemetry::{KeyValue, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{AdaptError, InstrumentRegistry};
use crate::event::{Event, EventKind, Handler, Label, LabelValue};

/// Name of the counter tracking events dropped by the adapter.
pub const DROPPED_EVENTS_METRIC: &str = "otelo_events_dropped";

/// Outcome of a successfully handled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The value was forwarded to an instrument.
    Recorded,
    /// The event was not a metric event.
    Ignored,
}

/// [`Handler`] that records metric events and ignores all others.
pub struct MetricHandler {
    registry: Arc<InstrumentRegistry>,
    dropped: AtomicU64,
    dropped_counter: Counter<u64>,
}

impl MetricHandler {
    pub fn new(registry: Arc<InstrumentRegistry>) -> Self {
        let dropped_counter = registry
            .meter()
            .u64_counter(DROPPED_EVENTS_METRIC)
            .with_description("Metric events dropped because they could not be adapted")
            .build();

        Self {
            registry,
            dropped: AtomicU64::new(0),
            dropped_counter,
        }
    }

    pub fn registry(&self) -> &Arc<InstrumentRegistry> {
        &self.registry
    }

    /// Number of events dropped since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record `event` on its instrument, creating the instrument if needed.
    ///
    /// Labels are converted before the instrument is resolved, so a malformed
    /// event never creates an instrument.
    pub fn try_handle(&self, event: &Event) -> Result<Handled, AdaptError> {
        let EventKind::Metric { metric, value } = &event.kind else {
            return Ok(Handled::Ignored);
        };

        let metric = metric.as_ref().ok_or(AdaptError::MissingMetric)?;
        let value = value.ok_or_else(|| AdaptError::MissingValue {
            metric: metric.name().to_string(),
        })?;

        let attributes = labels_to_attributes(&event.labels)?;
        let instrument = self
            .registry
            .get_or_create(metric.name(), metric.kind(), metric.options())?;
        instrument.record(value, &attributes)?;

        Ok(Handled::Recorded)
    }
}

impl Handler for MetricHandler {
    fn handle(&self, event: &Event) {
        if let Err(e) = self.try_handle(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            self.dropped_counter
                .add(1, &[KeyValue::new("reason", e.reason())]);
            tracing::warn!(error = %e, reason = e.reason(), "Dropping metric event");
        }
    }
}

/// Convert event labels to exporter attributes, skipping bookkeeping labels.
pub fn labels_to_attributes(labels: &[Label]) -> Result<Vec<KeyValue>, AdaptError> {
    labels
        .iter()
        .filter(|label| !label.is_bookkeeping())
        .map(label_to_attribute)
        .collect()
}

fn label_to_attribute(label: &Label) -> Result<KeyValue, AdaptError> {
    let value = match &label.value {
        LabelValue::Str(s) => Value::from(s.clone()),
        LabelValue::I64(n) => Value::I64(*n),
        LabelValue::U64(n) => {
            let n = i64::try_from(*n).map_err(|_| AdaptError::UnconvertibleLabel {
                name: label.name.clone(),
                reason: format!("unsigned value {n} does not fit in a signed 64-bit attribute"),
            })?;
            Value::I64(n)
        }
        LabelValue::F64(f) => Value::F64(*f),
        LabelValue::Bool(b) => Value::Bool(*b),
    };
    Ok(KeyValue::new(label.name.clone(), value))
}
