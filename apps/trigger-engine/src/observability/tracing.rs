//! Tracing initialization.
//!
//! Always installs a console (fmt) layer with an env-filter; when an OTLP
//! endpoint is configured, adds an OpenTelemetry export layer so engine spans
//! land in the tracing backend alongside the rest of the platform.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::ObservabilityConfig;

/// Service name attached to exported spans.
const SERVICE_NAME: &str = "trigger-engine";

/// Error type for tracing setup.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Failed to create the OTLP exporter.
    #[error("failed to create OTLP exporter: {0}")]
    ExporterError(String),
}

/// Tracer provider handle for graceful shutdown.
///
/// Hold this until the process exits so pending spans are flushed.
pub struct TracingGuard {
    provider: SdkTracerProvider,
}

impl TracingGuard {
    /// Shut down the tracer provider, flushing any pending spans.
    pub fn shutdown(self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::error!(error = %e, "failed to shutdown tracer provider");
        }
    }
}

/// Initialize tracing from observability configuration.
///
/// Returns a guard when the OpenTelemetry layer is active; `None` when only
/// console logging is configured.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be built.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<Option<TracingGuard>, TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let Some(endpoint) = config.otlp_endpoint.as_deref() else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TracingError::ExporterError(e.to_string()))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    let tracer = provider.tracer(SERVICE_NAME);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(OpenTelemetryLayer::new(tracer))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(endpoint, "OpenTelemetry tracing initialized");

    Ok(Some(TracingGuard { provider }))
}
