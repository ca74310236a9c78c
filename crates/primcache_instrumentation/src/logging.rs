//! Subscriber installation for binaries and benches.

use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, ParseError, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, fmt};

use crate::config::AppConfig;
use crate::exporters::{ConsoleExporter, JsonlExporter};
use crate::macros::METRICS_TARGET;
use crate::recorder::{MetricExporter, MetricsLayer};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to open metrics file: {0}")]
    Exporter(#[from] std::io::Error),
    #[error("invalid log directive: {0}")]
    Directive(#[from] ParseError),
    #[error("global subscriber already installed: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Exporters requested by `config`; empty when metrics are disabled.
pub fn exporters_for(config: &AppConfig) -> Result<Vec<Box<dyn MetricExporter>>, LoggingError> {
    let mut exporters: Vec<Box<dyn MetricExporter>> = Vec::new();
    if config.enable_console_metrics {
        exporters.push(Box::new(ConsoleExporter));
    }
    if let Some(path) = &config.metrics_jsonl_path {
        exporters.push(Box::new(JsonlExporter::new(path)?));
    }
    Ok(exporters)
}

/// Install the global subscriber: a `fmt` layer for logs at `config.log_level`
/// and, when any exporter is configured, a [`MetricsLayer`] for the `metrics` target.
///
/// Metric events never reach the `fmt` layer. `RUST_LOG` overrides the log level when set.
pub fn init_tracing(config: &AppConfig) -> Result<(), LoggingError> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy()
        .add_directive(format!("{METRICS_TARGET}=off").parse()?);

    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr).with_filter(log_filter);

    let exporters = exporters_for(config)?;
    let metrics_layer = (!exporters.is_empty()).then(|| {
        let filter = Targets::new()
            .with_target(METRICS_TARGET, Level::INFO)
            .with_target("primcache", Level::DEBUG);
        MetricsLayer::new(exporters).with_filter(filter)
    });

    tracing_subscriber::registry().with(fmt_layer).with(metrics_layer).try_init()?;
    tracing::debug!(target: "instrument", level = %config.log_level, "tracing initialised");
    Ok(())
}
