//! Logging and structured metrics for the plan cache.
//!
//! Metric events travel as ordinary `tracing` events on the `metrics` target,
//! so the core crate only needs `tracing` and pays nothing when no subscriber
//! is listening. [`recorder::MetricsLayer`] turns them back into
//! [`MetricEvent`] values for the exporters.

pub mod config;
pub mod event;
pub mod exporters;
pub mod logging;
pub mod macros;
pub mod prelude;
pub mod recorder;

pub use event::MetricEvent;

// Re-exported for `record_metric!` expansions in downstream crates.
#[doc(hidden)]
pub use serde_json;

#[cfg(test)]
mod tests;
