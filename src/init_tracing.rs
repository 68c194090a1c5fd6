use crate::config::{LogFormat, Tracing};
use color_eyre::config::Theme;
use console_subscriber::ConsoleLayer;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, Resource};
use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, registry::LookupSpan, Layer, Registry,
};

pub(super) fn init_tracing(tracing: &Tracing) -> color_eyre::Result<()> {
    let eyre_theme = if tracing.logging.format.has_ansi_colors() {
        Theme::dark()
    } else {
        Theme::new()
    };

    color_eyre::config::HookBuilder::new()
        .theme(eyre_theme)
        .add_default_filters()
        .install()?;

    LogTracer::init()?;

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let format_layer = build_format_layer(tracing);

    let subscriber = Registry::default()
        .with(format_layer)
        .with(ErrorLayer::default());

    if let Some(address) = tracing.console.address {
        println!("Starting console on {address}");

        let console_layer = ConsoleLayer::builder()
            .with_default_env()
            .event_buffer_capacity(tracing.console.buffer_capacity)
            .server_addr(address)
            .spawn();

        let subscriber = subscriber.with(console_layer);

        with_subscriber(subscriber, tracing)
    } else {
        with_subscriber(subscriber, tracing)
    }
}

fn build_format_layer<S>(tracing: &Tracing) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let fmt_span = if tracing.logging.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let format_layer = tracing_subscriber::fmt::layer().with_span_events(fmt_span);

    match tracing.logging.format {
        LogFormat::Compact => format_layer
            .compact()
            .with_filter(tracing.logging.targets.targets.clone())
            .boxed(),
        LogFormat::Json => format_layer
            .json()
            .with_filter(tracing.logging.targets.targets.clone())
            .boxed(),
        LogFormat::Normal => format_layer
            .with_filter(tracing.logging.targets.targets.clone())
            .boxed(),
        LogFormat::Pretty => format_layer
            .pretty()
            .with_filter(tracing.logging.targets.targets.clone())
            .boxed(),
    }
}

fn with_subscriber<S>(subscriber: S, tracing: &Tracing) -> color_eyre::Result<()>
where
    S: tracing::Subscriber + Send + Sync + 'static,
    for<'a> S: LookupSpan<'a>,
{
    if let Some(url) = tracing.opentelemetry.url.as_ref() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
                Resource::new(vec![KeyValue::new(
                    "service.name",
                    tracing.opentelemetry.service_name.clone(),
                )]),
            ))
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(url.as_str()),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        let otel_layer = tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(tracing.opentelemetry.targets.targets.clone());

        let subscriber = subscriber.with(otel_layer);

        set_global_default(subscriber)?;
    } else {
        set_global_default(subscriber)?;
    }

    Ok(())
}
