//! Exporter pair: one meter provider feeding both the Prometheus pull path
//! and the optional OTLP push path, plus the tracer provider.
//!
//! Lifecycle: `Uninitialized -> Ready -> Draining -> Closed`. The builder is
//! the uninitialized phase; [`Telemetry::shutdown`] drains and closes, and is
//! a no-op once closed.

pub mod otlp;
pub mod resource;

use opentelemetry::global;
use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self as sdktrace, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ResourceAttr};
use crate::error::{TelemetryError, TelemetryResult};
use crate::instruments::{InstrumentRegistry, MetricHandler};

/// Instrumentation scope name used for the meter and tracers.
pub const INSTRUMENTATION_SCOPE: &str = "otelo";

/// Lifecycle state of the exporter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Uninitialized = 0,
    Ready = 1,
    Draining = 2,
    Closed = 3,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Ready,
            2 => Self::Draining,
            3 => Self::Closed,
            _ => Self::Uninitialized,
        }
    }
}

/// Settings for [`Telemetry`]. The uninitialized phase of the pipeline.
#[derive(Debug, Clone)]
pub struct TelemetryBuilder {
    service_name: String,
    environment: String,
    resource_attrs: Vec<ResourceAttr>,
    otlp_endpoint: Option<String>,
    otlp_ca_cert: Option<PathBuf>,
    export_interval: Duration,
    push_readers: Vec<PeriodicReader>,
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self {
            service_name: "otelo".into(),
            environment: "development".into(),
            resource_attrs: Vec::new(),
            otlp_endpoint: None,
            otlp_ca_cert: None,
            export_interval: Duration::from_secs(10),
            push_readers: Vec::new(),
        }
    }
}

impl TelemetryBuilder {
    pub fn from_config(config: &Config) -> Self {
        Self {
            service_name: config.service_name.clone(),
            environment: config.environment.clone(),
            resource_attrs: config.resource_attrs.clone(),
            otlp_endpoint: config.otlp_endpoint.clone(),
            otlp_ca_cert: config.otlp_ca_cert.clone(),
            export_interval: config.export_interval(),
            push_readers: Vec::new(),
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_resource_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_attrs.push(ResourceAttr {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Enable the OTLP push path for metrics and traces.
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_otlp_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.otlp_ca_cert = Some(path.into());
        self
    }

    pub fn with_export_interval(mut self, interval: Duration) -> Self {
        self.export_interval = interval;
        self
    }

    /// Attach an extra push reader next to (or instead of) the OTLP one.
    ///
    /// The reader is drained together with the rest of the meter provider on
    /// [`Telemetry::shutdown`].
    pub fn with_push_reader(mut self, reader: PeriodicReader) -> Self {
        self.push_readers.push(reader);
        self
    }

    /// Construct providers and exporters and move to `Ready`.
    ///
    /// With an OTLP endpoint configured this must run inside a tokio runtime.
    pub fn build(self) -> TelemetryResult<Telemetry> {
        if self.export_interval.is_zero() {
            return Err(TelemetryError::Config(
                "export interval must be greater than zero".into(),
            ));
        }

        let state = AtomicU8::new(PipelineState::Uninitialized as u8);
        let resource =
            resource::build_resource(&self.service_name, &self.environment, &self.resource_attrs);
        let tls = otlp::tls_config(self.otlp_ca_cert.as_deref())?;

        // Traces are acquired first and released last.
        let mut tracer_builder = TracerProvider::builder().with_config(
            sdktrace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_resource(resource.clone()),
        );
        if let Some(endpoint) = &self.otlp_endpoint {
            let exporter = otlp::span_exporter(endpoint, tls.clone())?;
            tracer_builder = tracer_builder.with_batch_exporter(exporter, runtime::Tokio);
        }
        let tracer_provider = tracer_builder.build();
        global::set_text_map_propagator(TraceContextPropagator::new());

        let prometheus_registry = prometheus::Registry::new();
        let prometheus_exporter = opentelemetry_prometheus::exporter()
            .with_registry(prometheus_registry.clone())
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let mut meter_builder = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(prometheus_exporter);
        if let Some(endpoint) = &self.otlp_endpoint {
            let exporter = otlp::metric_exporter(endpoint, tls)?;
            let reader = PeriodicReader::builder(exporter, runtime::Tokio)
                .with_interval(self.export_interval)
                .build();
            meter_builder = meter_builder.with_reader(reader);
        }
        let push_enabled = self.otlp_endpoint.is_some() || !self.push_readers.is_empty();
        for reader in self.push_readers {
            meter_builder = meter_builder.with_reader(reader);
        }
        let meter_provider = meter_builder.build();

        let meter = meter_provider.meter_with_scope(
            InstrumentationScope::builder(INSTRUMENTATION_SCOPE)
                .with_version(env!("CARGO_PKG_VERSION"))
                .build(),
        );
        let registry = Arc::new(InstrumentRegistry::new(meter.clone()));
        let handler = Arc::new(MetricHandler::new(Arc::clone(&registry)));

        state.store(PipelineState::Ready as u8, Ordering::Release);

        Ok(Telemetry {
            resource,
            meter,
            meter_provider,
            tracer_provider,
            prometheus_registry,
            registry,
            handler,
            push_enabled,
            state,
        })
    }
}

/// Initialized providers, exporters and the shared instrument registry.
pub struct Telemetry {
    resource: Resource,
    meter: Meter,
    meter_provider: SdkMeterProvider,
    tracer_provider: TracerProvider,
    prometheus_registry: prometheus::Registry,
    registry: Arc<InstrumentRegistry>,
    handler: Arc<MetricHandler>,
    push_enabled: bool,
    state: AtomicU8,
}

impl Telemetry {
    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::default()
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn registry(&self) -> Arc<InstrumentRegistry> {
        Arc::clone(&self.registry)
    }

    /// The event adapter writing into this pipeline.
    pub fn metric_handler(&self) -> Arc<MetricHandler> {
        Arc::clone(&self.handler)
    }

    /// Registry the Prometheus exporter renders into.
    pub fn prometheus_registry(&self) -> prometheus::Registry {
        self.prometheus_registry.clone()
    }

    pub fn tracer(&self, name: &'static str) -> Tracer {
        self.tracer_provider.tracer(name)
    }

    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    /// Flush and close both providers, metrics first.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    /// Both providers are shut down even if the first one fails, and the
    /// pipeline ends `Closed` either way.
    pub fn shutdown(&self) -> TelemetryResult<()> {
        if self
            .state
            .compare_exchange(
                PipelineState::Ready as u8,
                PipelineState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::debug!(state = ?self.state(), "Telemetry already shut down");
            return Ok(());
        }

        tracing::info!("Draining telemetry pipeline");
        self.registry.close();

        let metrics = self
            .meter_provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(format!("meter provider: {e}")));
        let traces = self
            .tracer_provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(format!("tracer provider: {e}")));

        self.state
            .store(PipelineState::Closed as u8, Ordering::Release);
        tracing::info!("Telemetry pipeline closed");

        metrics.and(traces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Counter, Handler, Label};
    use crate::instruments::{AdaptError, InstrumentOptions, RegistryError};
    use opentelemetry_sdk::metrics::data::{ResourceMetrics, Sum};
    use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
    use opentelemetry_sdk::metrics::{MetricResult, Temporality};
    use prometheus::proto::MetricFamily;

    fn find_family<'a>(families: &'a [MetricFamily], prefix: &str) -> Option<&'a MetricFamily> {
        families.iter().find(|f| f.get_name().starts_with(prefix))
    }

    #[test]
    fn test_build_is_ready() {
        let telemetry = Telemetry::builder().build().unwrap();
        assert_eq!(telemetry.state(), PipelineState::Ready);
        assert!(!telemetry.push_enabled());
        assert!(telemetry.registry().is_empty());
    }

    #[test]
    fn test_zero_interval_is_config_error() {
        let err = Telemetry::builder()
            .with_export_interval(Duration::ZERO)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, TelemetryError::Config(_)));
    }

    #[test]
    fn test_exported_attributes_exclude_bookkeeping() {
        let telemetry = Telemetry::builder().build().unwrap();
        let counter = Counter::new("labelled", InstrumentOptions::new());

        counter.record(
            telemetry.metric_handler().as_ref(),
            1,
            vec![Label::new("a", "x"), Label::new("b", 5)],
        );

        let families = telemetry.prometheus_registry().gather();
        let family = find_family(&families, "labelled").expect("labelled metric exported");
        let metric = &family.get_metric()[0];
        let mut labels: Vec<(String, String)> = metric
            .get_label()
            .iter()
            .filter(|l| !l.get_name().starts_with("otel_scope"))
            .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
            .collect();
        labels.sort();

        assert_eq!(
            labels,
            vec![
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "5".to_string()),
            ]
        );
        assert_eq!(metric.get_counter().get_value(), 1.0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let telemetry = Telemetry::builder().build().unwrap();

        telemetry.shutdown().unwrap();
        assert_eq!(telemetry.state(), PipelineState::Closed);

        telemetry.shutdown().unwrap();
        assert_eq!(telemetry.state(), PipelineState::Closed);
    }

    #[test]
    fn test_writes_rejected_after_shutdown() {
        let telemetry = Telemetry::builder().build().unwrap();
        let handler = telemetry.metric_handler();
        let counter = Counter::new("late", InstrumentOptions::new());

        telemetry.shutdown().unwrap();
        counter.record(handler.as_ref(), 1, vec![]);

        assert_eq!(handler.dropped(), 1);
        let event = crate::event::Event::metric(
            Arc::clone(counter.descriptor()),
            crate::event::MetricValue::Int(1),
            vec![],
        );
        assert_eq!(
            handler.try_handle(&event),
            Err(AdaptError::Registry(RegistryError::Closed))
        );
        // The handler trait path never panics on a closed pipeline.
        handler.handle(&event);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_push_path_builds_and_drains() {
        let telemetry = Telemetry::builder()
            .with_otlp_endpoint("http://127.0.0.1:4317")
            .with_export_interval(Duration::from_secs(60))
            .build()
            .unwrap();
        assert!(telemetry.push_enabled());

        // Nothing listens on the collector port; the flush fails but the
        // pipeline still closes and stays closed.
        let telemetry = Arc::new(telemetry);
        let first = {
            let telemetry = Arc::clone(&telemetry);
            tokio::task::spawn_blocking(move || telemetry.shutdown())
                .await
                .unwrap()
        };
        assert!(matches!(first, Ok(()) | Err(TelemetryError::Shutdown(_))));
        assert_eq!(telemetry.state(), PipelineState::Closed);
        assert!(telemetry.shutdown().is_ok());
    }

    /// Push exporter keeping every exported counter sum, surviving shutdown.
    #[derive(Clone, Default)]
    struct RecordingExporter {
        sums: Arc<std::sync::Mutex<Vec<(String, u64)>>>,
        shut_down: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait::async_trait]
    impl PushMetricExporter for RecordingExporter {
        async fn export(&self, metrics: &mut ResourceMetrics) -> MetricResult<()> {
            let mut sums = self.sums.lock().unwrap();
            for metric in metrics.scope_metrics.iter().flat_map(|s| &s.metrics) {
                if let Some(sum) = metric.data.as_any().downcast_ref::<Sum<u64>>() {
                    for point in &sum.data_points {
                        sums.push((metric.name.to_string(), point.value));
                    }
                }
            }
            Ok(())
        }

        async fn force_flush(&self) -> MetricResult<()> {
            Ok(())
        }

        fn shutdown(&self) -> MetricResult<()> {
            self.shut_down.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn temporality(&self) -> Temporality {
            Temporality::Cumulative
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_flushes_push_path() {
        let exporter = RecordingExporter::default();
        // Long interval: only the drain can deliver the data.
        let reader = PeriodicReader::builder(exporter.clone(), runtime::Tokio)
            .with_interval(Duration::from_secs(3600))
            .build();
        let telemetry = Telemetry::builder().with_push_reader(reader).build().unwrap();
        assert!(telemetry.push_enabled());

        Counter::new("hits", InstrumentOptions::new()).record(
            telemetry.metric_handler().as_ref(),
            1,
            vec![],
        );
        assert!(exporter.sums.lock().unwrap().is_empty());

        let telemetry = Arc::new(telemetry);
        let drained = Arc::clone(&telemetry);
        tokio::task::spawn_blocking(move || drained.shutdown())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(telemetry.state(), PipelineState::Closed);
        assert!(exporter.shut_down.load(Ordering::SeqCst));
        assert_eq!(
            exporter.sums.lock().unwrap().as_slice(),
            &[("hits".to_string(), 1)]
        );
    }

    #[test]
    fn test_scope_carries_crate_version() {
        let telemetry = Telemetry::builder().build().unwrap();
        Counter::new("versioned", InstrumentOptions::new()).record(
            telemetry.metric_handler().as_ref(),
            1,
            vec![],
        );

        let families = telemetry.prometheus_registry().gather();
        let family = find_family(&families, "versioned").expect("versioned metric exported");
        let version = family.get_metric()[0]
            .get_label()
            .iter()
            .find(|l| l.get_name() == "otel_scope_version")
            .map(|l| l.get_value().to_string());
        assert_eq!(version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
    }
}
