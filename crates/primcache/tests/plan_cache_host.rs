use std::sync::mpsc;

use primcache::caching::CacheSettings;
use primcache::host::{HostBackend, pack_u4};
use primcache::{ArgRole, BindingMode, DataHandle, DataType, OpKey, OpVariant, PlanCache, PlanError, Query, TensorDesc};
use primcache_instrumentation::MetricEvent;
use primcache_instrumentation::prelude::{ChannelExporter, MetricExporter, MetricsLayer, SubscriberExt, subscriber};

/// `[1, 2] x u4 [2, 1]` with weights `[3, 5]`.
fn key() -> OpKey {
    OpKey::new(
        [
            TensorDesc::new([1, 2], DataType::F32),
            TensorDesc::new([2, 1], DataType::U4),
            TensorDesc::new([1, 1], DataType::F32),
        ],
        OpVariant::Plain,
    )
}

fn cache(mode: BindingMode) -> PlanCache<HostBackend> {
    PlanCache::from_settings(&CacheSettings {
        binding_mode: mode,
        ..CacheSettings::default()
    })
}

#[test]
fn rebinding_swaps_handles_without_rederiving_layouts() {
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let mut cache = cache(BindingMode::CarryForward);
    let weights = pack_u4(&[3, 5]);
    let first_src = [1.0f32, 1.0];
    let second_src = [2.0f32, 0.0];
    let mut dst = [0.0f32];

    let handle = cache.resolve_variant(&backend, key()).unwrap();
    unsafe {
        handle
            .execute(
                &stream,
                &engine,
                &[
                    (ArgRole::SRC, DataHandle::from_const(first_src.as_ptr())),
                    (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
                    (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
                ],
            )
            .unwrap();
    }
    assert_eq!(dst, [8.0]);
    let derived = backend.probe().snapshot().arg_md_derivations;
    assert_eq!(derived, 3);

    let handle = cache.resolve_variant(&backend, key()).unwrap();
    unsafe {
        handle
            .execute(
                &stream,
                &engine,
                &[(ArgRole::SRC, DataHandle::from_const(second_src.as_ptr()))],
            )
            .unwrap();
    }
    assert_eq!(dst, [6.0]);

    let probe = backend.probe().snapshot();
    assert_eq!(probe.arg_md_derivations, derived);
    assert_eq!(probe.memory_created, 3);
    assert_eq!(probe.plans_built, 1);

    let counters = handle.binding_counters();
    assert_eq!((counters.memory_created, counters.rebinds, counters.executions), (3, 1, 2));
    assert_eq!(handle.bound_handle(ArgRole::SRC), Some(DataHandle::from_const(second_src.as_ptr())));
}

#[test]
fn strict_mode_rejects_omitted_roles() {
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let mut cache = cache(BindingMode::Strict);
    let weights = pack_u4(&[3, 5]);
    let src = [1.0f32, 1.0];
    let mut dst = [0.0f32];

    let handle = cache.resolve_variant(&backend, key()).unwrap();
    assert_eq!(handle.binding_mode(), BindingMode::Strict);
    unsafe {
        handle
            .execute(
                &stream,
                &engine,
                &[
                    (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
                    (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
                    (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
                ],
            )
            .unwrap();
    }

    let result = unsafe { handle.execute(&stream, &engine, &[(ArgRole::SRC, DataHandle::from_const(src.as_ptr()))]) };
    assert_eq!(result, Err(PlanError::StaleBinding(ArgRole::WEIGHTS)));
    assert_eq!(handle.binding_counters().executions, 1);
}

#[test]
fn unknown_roles_and_non_memory_queries_fault() {
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let mut cache = cache(BindingMode::CarryForward);
    let src = [1.0f32, 1.0];
    let mut workspace = [0u8; 16];

    let handle = cache.resolve_variant(&backend, key()).unwrap();
    let result = unsafe {
        handle.execute(
            &stream,
            &engine,
            &[
                (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
                (ArgRole::Workspace, DataHandle::from_mut(workspace.as_mut_ptr())),
            ],
        )
    };
    assert_eq!(result, Err(PlanError::UnsupportedArgument(ArgRole::Workspace)));
    assert!(handle.bound_roles().is_empty());

    for query in [Query::PrimitiveKind, Query::NumInputs, Query::NumOutputs, Query::ImplInfo, Query::MemoryConsumption] {
        assert_eq!(handle.descriptor(query, 0), Err(PlanError::InvalidQuery(query)));
    }
    assert!(handle.descriptor(Query::Workspace, 0).unwrap().is_zero());
    assert_eq!(handle.descriptor(Query::Src, 0).unwrap().dims(), &[1, 2]);
}

#[test]
fn argument_creation_is_reported_once_per_role() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    subscriber::with_default(subscriber, || {
        let backend = HostBackend::new();
        let (engine, stream) = (backend.engine(), backend.stream());
        let mut cache = cache(BindingMode::CarryForward);
        let weights = pack_u4(&[3, 5]);
        let src = [1.0f32, 1.0];
        let mut dst = [0.0f32];
        let args = [
            (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
            (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
            (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
        ];
        for _ in 0..2 {
            let handle = cache.resolve_variant(&backend, key()).unwrap();
            unsafe { handle.execute(&stream, &engine, &args).unwrap() };
        }
    });

    let created: Vec<(String, u64)> = receiver
        .try_iter()
        .filter_map(|enriched| match enriched.event {
            MetricEvent::ArgumentMemoryCreated { role, bytes, .. } => Some((role, bytes)),
            _ => None,
        })
        .collect();
    assert_eq!(
        created,
        vec![("src".to_string(), 8), ("weights".to_string(), 1), ("dst".to_string(), 4)]
    );
}

#[test]
fn failed_binding_reports_no_argument_creation() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    subscriber::with_default(subscriber, || {
        let backend = HostBackend::new();
        let (engine, stream) = (backend.engine(), backend.stream());
        let mut cache = cache(BindingMode::CarryForward);
        let src = [1.0f32, 1.0];
        let mut workspace = [0u8; 16];

        let handle = cache.resolve_variant(&backend, key()).unwrap();
        let result = unsafe {
            handle.execute(
                &stream,
                &engine,
                &[
                    (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
                    (ArgRole::Workspace, DataHandle::from_mut(workspace.as_mut_ptr())),
                ],
            )
        };
        assert_eq!(result, Err(PlanError::UnsupportedArgument(ArgRole::Workspace)));
        assert_eq!(handle.binding_counters().memory_created, 0);
    });

    let events: Vec<MetricEvent> = receiver.try_iter().map(|enriched| enriched.event).collect();
    assert!(events.iter().any(|event| matches!(event, MetricEvent::PlanBuilt { .. })));
    assert!(!events.iter().any(|event| matches!(event, MetricEvent::ArgumentMemoryCreated { .. })));
}
