use std::sync::mpsc;
use std::time::Duration;

use crate::prelude::*;

#[test]
fn metrics_layer_enriches_span_context() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    let metric_event = MetricEvent::PlanBuilt {
        cache: "host".to_string(),
        key: "matmul".to_string(),
        build_us: 12,
    };

    let (parent_id, child_id) = subscriber::with_default(subscriber, || {
        let parent_span = info_span!("workload");
        let parent_id = parent_span.id().map(|id| id.into_u64()).expect("parent span should be active");
        let _parent_guard = parent_span.enter();

        let child_span = info_span!("plan_cache_resolve", cache = "host");
        let child_id = child_span.id().map(|id| id.into_u64()).expect("child span should be active");
        let _child_guard = child_span.enter();

        record_metric!(metric_event.clone());
        (Some(parent_id), Some(child_id))
    });

    let enriched = receiver.recv_timeout(Duration::from_secs(1)).expect("metric should be dispatched");

    assert_eq!(enriched.span_id, child_id);
    assert_eq!(enriched.parent_span_id, parent_id);
    assert_eq!(enriched.span_name.as_deref(), Some("plan_cache_resolve"));
    assert_eq!(enriched.span_fields.as_deref(), Some("cache=\"host\""));
    assert_eq!(enriched.event, metric_event);
}

#[test]
fn metrics_layer_ignores_non_metric_events() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    subscriber::with_default(subscriber, || {
        let span = info_span!("non_metric_span");
        let _guard = span.enter();
        info!("non-metric event should be ignored");
    });

    assert!(receiver.try_recv().is_err(), "channel should remain empty");
}
