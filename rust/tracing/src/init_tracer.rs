use opentelemetry::trace::TracerProvider;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt;
use tracing_subscriber::Registry;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtelFilterLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for OtelFilterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtelFilterLevel::Trace => f.write_str("trace"),
            OtelFilterLevel::Debug => f.write_str("debug"),
            OtelFilterLevel::Info => f.write_str("info"),
            OtelFilterLevel::Warn => f.write_str("warn"),
            OtelFilterLevel::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtelFilter {
    pub crate_name: String,
    pub filter_level: OtelFilterLevel,
}

fn global_filter_directives(custom_filters: &[OtelFilter]) -> String {
    // Crate names use underscores, the compiler rewrites hyphens in package
    // names when it turns them into identifiers.
    let default_crate_names = [
        "discovery_config",
        "discovery_error",
        "discovery_frontend",
        "discovery_migrate",
        "discovery_service",
        "discovery_storage",
        "discovery_tracing",
        "discovery_types",
        "migrate_storage",
    ];

    let mut directives = vec!["error".to_string()];
    directives.extend(default_crate_names.iter().map(|s| format!("{s}=debug")));
    directives.extend(
        custom_filters
            .iter()
            .map(|filter| format!("{}={}", filter.crate_name, filter.filter_level)),
    );
    directives.join(",")
}

pub fn init_global_filter_layer(custom_filters: &[OtelFilter]) -> BoxedLayer {
    let filter = std::env::var("RUST_LOG").unwrap_or(global_filter_directives(custom_filters));
    EnvFilter::new(filter).boxed()
}

pub fn init_otel_layer(
    service_name: &str,
    otel_endpoint: &str,
) -> Result<BoxedLayer, Box<dyn std::error::Error + Send + Sync>> {
    let resource = opentelemetry_sdk::Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new(
            "service.pod_name",
            std::env::var("HOSTNAME").unwrap_or("unknown".to_string()),
        ),
    ]);

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otel_endpoint)
        .build()?;
    let trace_config = opentelemetry_sdk::trace::Config::default().with_resource(resource);
    let tracer_provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(span_exporter, opentelemetry_sdk::runtime::Tokio)
        .with_config(trace_config)
        .build();
    let tracer = tracer_provider.tracer(service_name.to_string());
    global::set_tracer_provider(tracer_provider);
    Ok(tracing_opentelemetry::OpenTelemetryLayer::new(tracer).boxed())
}

pub fn init_stdout_layer() -> BoxedLayer {
    fmt::layer().with_target(false).boxed()
}

pub fn init_tracing(
    layers: Vec<BoxedLayer>,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    global::set_text_map_propagator(TraceContextPropagator::new());
    let subscriber = tracing_subscriber::registry().with(layers);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::info!("Global tracing subscriber set");
    Ok(())
}

pub fn init_panic_tracing_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();

        let payload = if let Some(s) = payload.downcast_ref::<&str>() {
            Some(&**s)
        } else {
            payload.downcast_ref::<String>().map(|s| s.as_str())
        };

        tracing::error!(
            panic.payload = payload,
            panic.location = panic_info.location().map(|l| l.to_string()),
            panic.backtrace = tracing::field::display(std::backtrace::Backtrace::capture()),
            "A panic occurred"
        );

        prev_hook(panic_info);
    }));
}

/// Install the global subscriber: env filter, stdout, and an OTLP exporter
/// when `otel_endpoint` is set. A broken exporter is logged and skipped so
/// the process still gets stdout logs.
pub fn init_otel_tracing(
    service_name: &str,
    custom_filters: &[OtelFilter],
    otel_endpoint: Option<&str>,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    // The global filter applies to all subsequent layers
    let mut layers = vec![init_global_filter_layer(custom_filters)];
    let mut otel_error = None;
    if let Some(endpoint) = otel_endpoint {
        match init_otel_layer(service_name, endpoint) {
            Ok(layer) => layers.push(layer),
            Err(err) => otel_error = Some(err),
        }
    }
    layers.push(init_stdout_layer());
    init_tracing(layers)?;
    init_panic_tracing_hook();
    if let Some(err) = otel_error {
        tracing::warn!(error = %err, "OTLP exporter disabled");
    }
    Ok(())
}
