//! Log subscriber setup, with span export over OTLP when an endpoint is set.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{Config, Environment, LogFormat, TelemetryConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`.
pub fn init_telemetry(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let otel_layer = create_otel_tracer(&config.telemetry, config.server.environment)
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer).boxed());

    let mut layers = vec![fmt_layer(config.logging.format)];
    layers.extend(otel_layer);

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();
}

fn create_otel_tracer(
    config: &TelemetryConfig,
    environment: Environment,
) -> Option<sdktrace::Tracer> {
    let endpoint = config.otlp_endpoint.as_ref()?;

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            // The subscriber is not installed yet, so this cannot go through tracing.
            eprintln!("OTLP exporter for {endpoint} not created: {e}");
            return None;
        }
    };

    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("deployment.environment", environment.as_str()),
    ]);

    let provider = sdktrace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);

    Some(tracer)
}

/// Flushes pending spans. Call once, after the server stops.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
