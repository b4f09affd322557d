//! Generic key/value event model.
//!
//! Producers build [`Event`]s either directly or through the typed metric
//! front-ends ([`Counter`], [`FloatGauge`], [`DurationDistribution`]) and hand
//! them to a [`Handler`]. The metric kind travels with the event as a tagged
//! variant, so consumers never inspect types at runtime.

use std::sync::Arc;
use std::time::Duration;

use crate::instruments::{InstrumentKind, InstrumentOptions};

/// Label carrying the metric name on metric events.
pub const METRIC_KEY: &str = "metric";

/// Label carrying the recorded value on metric events.
pub const METRIC_VALUE_KEY: &str = "metric.value";

/// Value of a single event label.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelValue {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
}

impl From<&str> for LabelValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<i32> for LabelValue {
    fn from(v: i32) -> Self {
        Self::I64(i64::from(v))
    }
}

impl From<u64> for LabelValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<bool> for LabelValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A named event label.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub value: LabelValue,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whether this label is internal bookkeeping rather than user data.
    pub fn is_bookkeeping(&self) -> bool {
        self.name == METRIC_KEY || self.name == METRIC_VALUE_KEY
    }
}

/// A value observed on a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Duration(Duration),
}

impl From<MetricValue> for LabelValue {
    fn from(v: MetricValue) -> Self {
        match v {
            MetricValue::Int(n) => Self::I64(n),
            MetricValue::Float(f) => Self::F64(f),
            MetricValue::Duration(d) => Self::I64(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)),
        }
    }
}

/// Identity and options of a metric, resolved once when the front-end is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    name: String,
    kind: InstrumentKind,
    options: InstrumentOptions,
}

impl MetricDescriptor {
    pub fn new(name: impl Into<String>, kind: InstrumentKind, options: InstrumentOptions) -> Self {
        Self {
            name: name.into(),
            kind,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn options(&self) -> &InstrumentOptions {
        &self.options
    }
}

/// What an event is about.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Free-form log line. Ignored by metric handlers.
    Log { message: String },
    /// A metric observation. Both fields are optional so events assembled
    /// from untyped sources can be rejected instead of trusted.
    Metric {
        metric: Option<Arc<MetricDescriptor>>,
        value: Option<MetricValue>,
    },
}

/// An immutable event consumed synchronously by a [`Handler`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub labels: Vec<Label>,
}

impl Event {
    pub fn log(message: impl Into<String>, labels: Vec<Label>) -> Self {
        Self {
            kind: EventKind::Log {
                message: message.into(),
            },
            labels,
        }
    }

    /// A well-formed metric event. The metric name and value are appended as
    /// bookkeeping labels for handlers that only look at labels.
    pub fn metric(metric: Arc<MetricDescriptor>, value: MetricValue, mut labels: Vec<Label>) -> Self {
        labels.push(Label::new(METRIC_KEY, metric.name()));
        labels.push(Label::new(METRIC_VALUE_KEY, value));
        Self {
            kind: EventKind::Metric {
                metric: Some(metric),
                value: Some(value),
            },
            labels,
        }
    }

    /// A metric event exactly as received, without added bookkeeping labels.
    pub fn raw_metric(
        metric: Option<Arc<MetricDescriptor>>,
        value: Option<MetricValue>,
        labels: Vec<Label>,
    ) -> Self {
        Self {
            kind: EventKind::Metric { metric, value },
            labels,
        }
    }

    pub fn is_metric(&self) -> bool {
        matches!(self.kind, EventKind::Metric { .. })
    }
}

/// Consumer of events.
pub trait Handler: Send + Sync {
    fn handle(&self, event: &Event);
}

macro_rules! metric_front_end {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $value:ty, $wrap:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            descriptor: Arc<MetricDescriptor>,
        }

        impl $name {
            pub fn new(name: impl Into<String>, options: InstrumentOptions) -> Self {
                Self {
                    descriptor: Arc::new(MetricDescriptor::new(name, $kind, options)),
                }
            }

            pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
                &self.descriptor
            }

            /// Emit one observation to `handler`.
            pub fn record(&self, handler: &dyn Handler, value: $value, labels: Vec<Label>) {
                let event = Event::metric(Arc::clone(&self.descriptor), $wrap(value), labels);
                handler.handle(&event);
            }
        }
    };
}

metric_front_end!(
    /// Monotonic integer count.
    Counter,
    InstrumentKind::Counter,
    i64,
    MetricValue::Int
);

metric_front_end!(
    /// Floating point value that moves up and down.
    FloatGauge,
    InstrumentKind::UpDownCounter,
    f64,
    MetricValue::Float
);

metric_front_end!(
    /// Distribution of durations.
    DurationDistribution,
    InstrumentKind::Histogram,
    Duration,
    MetricValue::Duration
);
