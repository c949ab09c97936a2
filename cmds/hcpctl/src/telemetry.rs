//! Logging and trace export.
//!
//! Logs go to stderr so rendered manifests on stdout stay clean. A TTY gets
//! the pretty format, anything else gets JSON lines. Spans are exported over
//! OTLP only when an OTLP endpoint is configured in the environment.

use std::io::IsTerminal;

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing::{Level, Subscriber};
use tracing_subscriber::{
	layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

const SERVICE_NAME: &str = "hcpctl";

/// Read by `Resource::builder()`; only consulted here to decide on the fallback.
const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

/// Flushes exported spans when dropped. Keep it alive for the whole run.
#[must_use]
pub struct TelemetryGuard {
	tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
	fn drop(&mut self) {
		if let Some(provider) = self.tracer_provider.take() {
			if let Err(e) = provider.shutdown() {
				eprintln!("Failed to shutdown tracer provider: {e}");
			}
		}
	}
}

/// Install the global subscriber.
///
/// `log_level` (the `--log-level` flag) wins over `RUST_LOG`, which wins over `info`.
pub fn init(log_level: Option<Level>) -> Result<TelemetryGuard> {
	let filter = match log_level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy(),
	};

	let registry = tracing_subscriber::registry()
		.with(filter)
		.with(stderr_layer(std::io::stderr().is_terminal()));

	if !otlp_configured() {
		registry.init();
		return Ok(TelemetryGuard {
			tracer_provider: None,
		});
	}

	let provider = tracer_provider()?;
	let otel = tracing_opentelemetry::layer()
		.with_error_records_to_exceptions(true)
		.with_tracer(provider.tracer(SERVICE_NAME));
	registry.with(otel).init();
	opentelemetry::global::set_tracer_provider(provider.clone());

	Ok(TelemetryGuard {
		tracer_provider: Some(provider),
	})
}

fn stderr_layer<S>(pretty: bool) -> Box<dyn Layer<S> + Send + Sync>
where
	S: Subscriber + for<'span> LookupSpan<'span>,
{
	let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
	if pretty {
		layer.pretty().boxed()
	} else {
		layer.json().boxed()
	}
}

fn otlp_configured() -> bool {
	[
		opentelemetry_otlp::OTEL_EXPORTER_OTLP_ENDPOINT,
		opentelemetry_otlp::OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
	]
	.iter()
	.any(|var| std::env::var_os(var).is_some())
}

fn tracer_provider() -> Result<SdkTracerProvider> {
	let mut resource = Resource::builder();
	if std::env::var_os(OTEL_SERVICE_NAME).is_none() {
		resource = resource.with_service_name(SERVICE_NAME);
	}

	let protocol = std::env::var(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL);
	let exporter = match protocol
		.as_deref()
		.unwrap_or(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL_DEFAULT)
	{
		"grpc" => opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.build()?,
		_ => opentelemetry_otlp::SpanExporter::builder()
			.with_http()
			.build()?,
	};

	Ok(SdkTracerProvider::builder()
		.with_resource(resource.build())
		.with_batch_exporter(exporter)
		.build())
}
