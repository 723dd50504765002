//! Logging and OpenTelemetry bootstrap
//!
//! The engine only emits `tracing` events and OpenTelemetry metrics and never
//! installs a subscriber by itself. Applications that want the stock pipeline
//! call [`init_observability`] once at startup and [`shutdown_observability`]
//! before exit:
//!
//! ```rust,no_run
//! use rpclink_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("desk-agent")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("rpclink_client=debug,info");
//!
//!     if let Err(e) = rpclink_core::init_observability(config) {
//!         eprintln!("telemetry disabled: {}", e);
//!     }
//!     // ... connect clients ...
//!     rpclink_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: default collector endpoint
//! - `RUST_LOG`: log filter, wins over `log_level`

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider, Tracer};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Error type of the bootstrap functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// Providers installed by [`init_observability`], kept for shutdown
struct Installed {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

static INSTALLED: Mutex<Installed> = Mutex::new(Installed {
    tracer_provider: None,
    meter_provider: None,
});

/// What to export and where
///
/// Defaults: service "rpclink" at this crate's version, endpoint from
/// `OTEL_EXPORTER_OTLP_ENDPOINT` (else `http://localhost:4317`), spans,
/// metrics and JSON logs on, metrics pushed every 30s, log level from
/// `RUST_LOG` (else "info").
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub service_version: String,
    /// OTLP/gRPC collector endpoint
    pub otlp_endpoint: String,
    pub enable_traces: bool,
    pub enable_metrics: bool,
    /// Structured JSON logs on stdout
    pub enable_logs: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    pub metrics_interval: Duration,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "rpclink".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_interval: Duration::from_secs(30),
        }
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Fallback log filter, e.g. `"rpclink_client=debug,info"`
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    /// How often aggregated metrics are pushed
    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes([
                KeyValue::new(SERVICE_NAME, self.service_name.clone()),
                KeyValue::new(SERVICE_VERSION, self.service_version.clone()),
            ])
            .build()
    }
}

/// Install the tracing subscriber and the global OpenTelemetry providers
///
/// Call once per process. The subscriber is installed last, so a second call
/// fails without touching the first call's logging.
///
/// # Errors
///
/// Fails if an exporter cannot be built, the log filter does not parse, or a
/// global subscriber is already installed.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let tracer_provider = config
        .enable_traces
        .then(|| span_pipeline(&config))
        .transpose()?;
    let meter_provider = config
        .enable_metrics
        .then(|| metric_pipeline(&config))
        .transpose()?;

    let tracer: Option<Tracer> = tracer_provider
        .as_ref()
        .map(|provider| provider.tracer(config.service_name.clone()));
    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));
    let json_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .try_init()?;

    let mut installed = INSTALLED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(provider) = tracer_provider {
        global::set_tracer_provider(provider.clone());
        installed.tracer_provider = Some(provider);
    }
    if let Some(provider) = meter_provider {
        global::set_meter_provider(provider.clone());
        installed.meter_provider = Some(provider);
    }

    tracing::info!(
        service = %config.service_name,
        endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );
    Ok(())
}

fn span_pipeline(config: &ObservabilityConfig) -> Result<SdkTracerProvider, BoxError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(config.resource())
        .build())
}

fn metric_pipeline(config: &ObservabilityConfig) -> Result<SdkMeterProvider, BoxError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.metrics_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build())
}

/// Flush and shut down the providers installed by [`init_observability`]
///
/// Safe to call more than once, or without a prior init.
pub fn shutdown_observability() {
    let mut installed = INSTALLED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let tracer_provider = installed.tracer_provider.take();
    let meter_provider = installed.meter_provider.take();
    drop(installed);

    if tracer_provider.is_none() && meter_provider.is_none() {
        return;
    }
    tracing::info!("Shutting down observability");

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(provider) = meter_provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}
