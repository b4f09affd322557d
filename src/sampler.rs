//! Periodic synthetic load generator.
//!
//! Each tick opens a `Run` span and records one increment of `add_count`
//! through the configured [`Handler`]. The wait restarts after every tick.

use opentelemetry::trace::{Span as _, Tracer as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::Tracer;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::event::{Counter, Handler, Label};
use crate::instruments::InstrumentOptions;

/// Name of the counter the sampler increments.
pub const SAMPLE_METRIC: &str = "add_count";

/// Synthetic load loop.
pub struct Sampler {
    handler: Arc<dyn Handler>,
    tracer: Tracer,
    counter: Counter,
    interval: Duration,
    max_ticks: Option<u64>,
}

impl Sampler {
    pub fn new(handler: Arc<dyn Handler>, tracer: Tracer, interval: Duration) -> Self {
        Self {
            handler,
            tracer,
            counter: Counter::new(
                SAMPLE_METRIC,
                InstrumentOptions::new().with_description("how many times add function has been called."),
            ),
            interval,
            max_ticks: None,
        }
    }

    /// Stop on its own after `max` ticks.
    pub fn with_max_ticks(mut self, max: u64) -> Self {
        self.max_ticks = Some(max);
        self
    }

    /// Run until cancelled or until the tick bound is reached.
    ///
    /// Returns the number of ticks emitted.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let mut ticks = 0;

        loop {
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                tracing::info!(ticks, "Sampler reached its tick bound");
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!(ticks, "Sampler cancelled");
                    break;
                }
                () = tokio::time::sleep(self.interval) => {
                    self.tick();
                    ticks += 1;
                }
            }
        }

        ticks
    }

    fn tick(&self) {
        let mut span = self.tracer.start("Run");
        span.set_attribute(KeyValue::new("request.n", 10_i64));

        tracing::debug!(metric = SAMPLE_METRIC, "Sending count");
        self.counter
            .record(self.handler.as_ref(), 1, vec![Label::new("key", "component")]);

        span.end();
    }
}
