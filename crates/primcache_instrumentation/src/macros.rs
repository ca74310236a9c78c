//! Macros for emitting [`MetricEvent`](crate::MetricEvent)s.

/// Target every metric event is emitted on.
pub const METRICS_TARGET: &str = "metrics";

/// Emit a `MetricEvent` as a tracing event on the `metrics` target.
///
/// The event expression is only evaluated when a subscriber is interested,
/// so callers can build keys and strings inside it without paying for them on
/// an uninstrumented hot path. Callers must depend on `tracing` directly.
#[macro_export]
macro_rules! record_metric {
    ($event:expr) => {{
        if tracing::enabled!(target: "metrics", tracing::Level::INFO) {
            let __event: $crate::MetricEvent = $event;
            if let Ok(__metric_json) = $crate::serde_json::to_string(&__event) {
                tracing::event!(target: "metrics", tracing::Level::INFO, metric = %__metric_json);
            }
        }
    }};
}
