//! Tracing layer and exporter abstractions for metric collection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Event, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use crate::{event::MetricEvent, macros::METRICS_TARGET};

/// A metric event plus the tracing context it was emitted from.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedMetricEvent {
    pub timestamp: DateTime<Utc>,
    pub span_id: Option<u64>,
    pub parent_span_id: Option<u64>,
    pub span_name: Option<String>,
    /// Fields recorded on the active span, e.g. `cache="host"` on `plan_cache_resolve`.
    pub span_fields: Option<String>,
    pub event: MetricEvent,
}

/// Sink for enriched metric events.
pub trait MetricExporter: Send + Sync {
    fn export(&self, event: &EnrichedMetricEvent);
}

/// Decodes `metrics`-target events and fans them out to exporters.
#[derive(Clone)]
pub struct MetricsLayer {
    exporters: Arc<Vec<Box<dyn MetricExporter>>>,
}

impl MetricsLayer {
    pub fn new(exporters: Vec<Box<dyn MetricExporter>>) -> Self {
        Self {
            exporters: Arc::new(exporters),
        }
    }

    fn dispatch(&self, event: &EnrichedMetricEvent) {
        for exporter in self.exporters.iter() {
            exporter.export(event);
        }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = SpanFieldVisitor::default();
        attrs.record(&mut visitor);
        if !visitor.fields.is_empty() {
            span.extensions_mut().insert(SpanFields(visitor.fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if event.metadata().target() != METRICS_TARGET {
            return;
        }

        let mut visitor = MetricVisitor::default();
        event.record(&mut visitor);
        let Some(metric_json) = visitor.metric_json else {
            return;
        };

        let metric_event: MetricEvent = match serde_json::from_str(&metric_json) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(target: "instrument", %error, "dropping undecodable metric event");
                return;
            }
        };

        let span = ctx.event_span(event);
        let enriched = EnrichedMetricEvent {
            timestamp: Utc::now(),
            span_id: span.as_ref().map(|s| s.id().into_u64()),
            parent_span_id: span.as_ref().and_then(|s| s.parent()).map(|parent| parent.id().into_u64()),
            span_name: span.as_ref().map(|s| s.name().to_string()),
            span_fields: span
                .as_ref()
                .and_then(|s| s.extensions().get::<SpanFields>().map(|fields| fields.0.clone())),
            event: metric_event,
        };

        self.dispatch(&enriched);
    }
}

struct SpanFields(String);

#[derive(Default)]
struct SpanFieldVisitor {
    fields: String,
}

impl tracing::field::Visit for SpanFieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        self.fields.push_str(&format!("{}={:?}", field.name(), value));
    }
}

#[derive(Default)]
struct MetricVisitor {
    metric_json: Option<String>,
}

impl tracing::field::Visit for MetricVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "metric" {
            self.metric_json = Some(format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "metric" {
            self.metric_json = Some(value.to_string());
        }
    }
}
