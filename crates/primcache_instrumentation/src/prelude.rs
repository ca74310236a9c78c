//! Convenience re-exports for instrumentation consumers.

pub use crate::config::{AppConfig, AppConfigError};
pub use crate::event::MetricEvent;
pub use crate::exporters::{ChannelExporter, ConsoleExporter, JsonlExporter};
pub use crate::logging::{LoggingError, exporters_for, init_tracing};
pub use crate::macros::METRICS_TARGET;
pub use crate::recorder::{EnrichedMetricEvent, MetricExporter, MetricsLayer};
pub use crate::record_metric;

pub use primcache_env::{EnvVarGuard, InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH};

pub use chrono::{DateTime, Utc};
pub use serde_json;
pub use tracing::{Level, info, info_span, subscriber};
pub use tracing_subscriber::{self, layer::SubscriberExt};
