//! Cache behaviour against a counting mock backend.

use std::cell::Cell;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::mpsc;

use primcache_instrumentation::MetricEvent;
use primcache_instrumentation::prelude::{ChannelExporter, MetricExporter, MetricsLayer, SubscriberExt, subscriber};

use super::*;
use crate::args::MdKind;
use crate::backend::{CompiledPlan, MemoryObject};
use crate::bindings::ExecArgs;
use crate::caching::{CacheEventKind, EvictionStrategy};
use crate::config::Activation;
use crate::key::{Granularity, QuantParam};
use crate::types::{DataHandle, DataType, Layout, MemoryDesc, MemoryKind, TensorDesc};
use crate::variant::OpVariant;

#[derive(Default)]
struct MockBackend {
    built: Cell<u64>,
}

struct MockPlan {
    id: u64,
    post_ops: usize,
}

struct MockMemory {
    desc: MemoryDesc,
    handle: DataHandle,
}

impl MemoryObject for MockMemory {
    fn desc(&self) -> &MemoryDesc {
        &self.desc
    }

    fn data_handle(&self) -> DataHandle {
        self.handle
    }

    fn set_data_handle(&mut self, handle: DataHandle) {
        self.handle = handle;
    }
}

impl CompiledPlan for MockPlan {
    type Stream = ();
    type Memory = MockMemory;

    fn query_md(&self, kind: MdKind, index: usize) -> MemoryDesc {
        match (kind, index) {
            (MdKind::Src, 0) | (MdKind::Dst, 0) => MemoryDesc::row_major(&[4], DataType::F32),
            _ => MemoryDesc::zero(),
        }
    }

    fn impl_info(&self) -> &str {
        "mock"
    }

    unsafe fn execute(&self, _stream: &(), _args: &ExecArgs<MockMemory>) -> Result<(), PlanError> {
        Ok(())
    }
}

impl KernelBackend for MockBackend {
    const NAME: &'static str = "mock";

    type Engine = ();
    type Stream = ();
    type Memory = MockMemory;
    type Plan = MockPlan;

    fn build_plan(&self, key: &OpKey, config: &PlanConfig) -> Result<MockPlan, PlanError> {
        if key.operands.iter().any(|operand| operand.dims.contains(&0)) {
            return Err(PlanError::InvalidShape(format!("empty operand in {key}")));
        }
        let id = self.built.get() + 1;
        self.built.set(id);
        Ok(MockPlan {
            id,
            post_ops: config.post_ops().len(),
        })
    }

    fn make_memory(_engine: &(), md: &MemoryDesc, _kind: MemoryKind, handle: DataHandle) -> Result<MockMemory, PlanError> {
        Ok(MockMemory { desc: md.clone(), handle })
    }
}

fn key(rows: usize, variant: OpVariant) -> OpKey {
    OpKey::new(
        [
            TensorDesc::new([rows, 256], DataType::F32),
            TensorDesc::new([256, 64], DataType::U4),
            TensorDesc::new([rows, 64], DataType::F32),
        ],
        variant,
    )
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn plan_id(cache: &mut PlanCache<MockBackend>, backend: &MockBackend, key: OpKey) -> u64 {
    cache.resolve_variant(backend, key).unwrap().plan().id
}

#[test]
fn hit_returns_same_plan_without_configuring() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::new();
    let mut calls = 0;

    let first = cache
        .resolve(&backend, key(128, OpVariant::Plain), |_| {
            calls += 1;
            Ok(())
        })
        .unwrap()
        .plan()
        .id;
    let second = cache
        .resolve(&backend, key(128, OpVariant::Plain), |_| {
            calls += 1;
            Ok(())
        })
        .unwrap()
        .plan()
        .id;

    assert_eq!(first, second);
    assert_eq!(calls, 1);
    assert_eq!(backend.built.get(), 1);
    let metrics = cache.metrics();
    assert_eq!((metrics.hits, metrics.misses), (1, 1));
    assert_eq!(metrics.max_reuse_count, Some(1));
}

#[test]
fn single_component_changes_build_distinct_plans() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::new();

    let base = key(128, OpVariant::Plain);
    let mut layout = base.clone();
    layout.operands[1].layout = Layout::ColMajor;
    let mut dtype = base.clone();
    dtype.operands[1].dtype = DataType::S4;
    let variants = [
        base.clone(),
        key(64, OpVariant::Plain),
        key(128, OpVariant::Activation(Activation::Silu)),
        layout,
        dtype,
        base.with_scales(QuantParam::new(Granularity::PerChannel, DataType::F32)),
    ];

    let mut ids = HashSet::new();
    for k in variants {
        let mut calls = 0;
        let handle = cache
            .resolve(&backend, k, |config| {
                calls += 1;
                OpVariant::Plain.configure(config)
            })
            .unwrap();
        ids.insert(handle.plan().id);
        assert_eq!(calls, 1);
    }

    assert_eq!(ids.len(), 6);
    assert_eq!(cache.len(), 6);
}

#[test]
fn scenario_variant_only_difference() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::new();
    let k1 = key(128, OpVariant::Plain);
    let k2 = key(128, OpVariant::Activation(Activation::Silu));

    let p1 = plan_id(&mut cache, &backend, k1.clone());
    assert_eq!(backend.built.get(), 1);
    assert_eq!(plan_id(&mut cache, &backend, k1), p1);
    assert_eq!(backend.built.get(), 1);

    let p2 = cache.resolve_variant(&backend, k2.clone()).unwrap();
    assert_ne!(p2.plan().id, p1);
    assert_eq!(p2.plan().post_ops, 1);
    assert_eq!(backend.built.get(), 2);
    assert!(cache.contains(&k2));
}

#[test]
fn scenario_capacity_two_evicts_first_key() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::with_policy(EvictionPolicy::lru(capacity(2)));
    let (a, b, c) = (key(1, OpVariant::Plain), key(2, OpVariant::Plain), key(3, OpVariant::Plain));

    plan_id(&mut cache, &backend, a.clone());
    plan_id(&mut cache, &backend, b.clone());
    plan_id(&mut cache, &backend, c.clone());

    assert!(!cache.contains(&a));
    assert!(cache.contains(&b) && cache.contains(&c));
    assert_eq!(cache.metrics().evictions, 1);

    plan_id(&mut cache, &backend, a.clone());
    assert_eq!(backend.built.get(), 4, "resolving an evicted key rebuilds it");
    assert!(!cache.contains(&b));
    assert_eq!(cache.len(), 2);
}

#[test]
fn lru_victim_is_least_recently_resolved() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::with_policy(EvictionPolicy::lru(capacity(3)));

    for rows in 1..=3 {
        plan_id(&mut cache, &backend, key(rows, OpVariant::Plain));
    }
    plan_id(&mut cache, &backend, key(1, OpVariant::Plain));
    plan_id(&mut cache, &backend, key(4, OpVariant::Plain));

    assert_eq!(cache.len(), 3);
    assert!(cache.contains(&key(1, OpVariant::Plain)));
    assert!(!cache.contains(&key(2, OpVariant::Plain)));
    assert_eq!(cache.metrics().evictions, 1);
}

#[test]
fn eviction_keeps_remaining_plans_addressable() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::with_policy(EvictionPolicy::lru(capacity(3)));

    for rows in 1..=3 {
        plan_id(&mut cache, &backend, key(rows, OpVariant::Plain));
    }
    plan_id(&mut cache, &backend, key(2, OpVariant::Plain));
    plan_id(&mut cache, &backend, key(3, OpVariant::Plain));
    assert_eq!(plan_id(&mut cache, &backend, key(4, OpVariant::Plain)), 4);

    assert_eq!(cache.peek(&key(3, OpVariant::Plain)).map(|handle| handle.key().clone()), Some(key(3, OpVariant::Plain)));
    assert_eq!(plan_id(&mut cache, &backend, key(3, OpVariant::Plain)), 3);
    assert_eq!(plan_id(&mut cache, &backend, key(2, OpVariant::Plain)), 2);
    assert_eq!(plan_id(&mut cache, &backend, key(4, OpVariant::Plain)), 4);

    assert_eq!(plan_id(&mut cache, &backend, key(5, OpVariant::Plain)), 5);
    assert!(!cache.contains(&key(3, OpVariant::Plain)));
    for (rows, id) in [(2, 2), (4, 4), (5, 5)] {
        assert_eq!(plan_id(&mut cache, &backend, key(rows, OpVariant::Plain)), id);
    }
    assert_eq!(backend.built.get(), 5);
    assert_eq!(cache.metrics().evictions, 2);
}

#[test]
fn fifo_ignores_recency() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::with_policy(EvictionPolicy::fifo(capacity(2)));
    assert_eq!(cache.policy().strategy, EvictionStrategy::Fifo);

    plan_id(&mut cache, &backend, key(1, OpVariant::Plain));
    plan_id(&mut cache, &backend, key(2, OpVariant::Plain));
    plan_id(&mut cache, &backend, key(1, OpVariant::Plain));
    plan_id(&mut cache, &backend, key(3, OpVariant::Plain));

    assert!(!cache.contains(&key(1, OpVariant::Plain)));
    assert!(cache.contains(&key(2, OpVariant::Plain)));
}

#[test]
fn size_never_exceeds_capacity() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::with_policy(EvictionPolicy::lru(capacity(8)));
    for rows in 1..=100 {
        plan_id(&mut cache, &backend, key(rows, OpVariant::Plain));
        assert!(cache.len() <= cache.capacity());
    }
    let metrics = cache.metrics();
    assert_eq!(metrics.size, 8);
    assert_eq!(metrics.evictions, 92);
}

#[test]
fn failed_build_neither_inserts_nor_evicts() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::with_policy(EvictionPolicy::lru(capacity(1)));
    let good = key(4, OpVariant::Plain);
    plan_id(&mut cache, &backend, good.clone());

    let bad = key(0, OpVariant::Plain);
    let error = cache.resolve_variant(&backend, bad.clone()).unwrap_err();
    assert!(matches!(error, PlanError::InvalidShape(_)));

    let refused = cache
        .resolve(&backend, key(5, OpVariant::Plain), |_| Err(PlanError::Configuration("refused".into())))
        .unwrap_err();
    assert_eq!(refused, PlanError::Configuration("refused".into()));

    assert!(cache.contains(&good));
    assert!(!cache.contains(&bad));
    let metrics = cache.metrics();
    assert_eq!(metrics.size, 1);
    assert_eq!(metrics.evictions, 0);
    assert_eq!(metrics.build_failures, 2);
    assert_eq!(backend.built.get(), 1);
}

#[test]
fn clear_drops_plans_but_keeps_counters() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::new();
    plan_id(&mut cache, &backend, key(1, OpVariant::Plain));
    plan_id(&mut cache, &backend, key(2, OpVariant::Plain));

    assert_eq!(cache.clear(), 2);
    assert!(cache.is_empty());
    let metrics = cache.metrics();
    assert_eq!(metrics.misses, 2);
    assert_eq!(metrics.last_event.map(|event| event.kind), Some(CacheEventKind::Cleared));
}

#[test]
fn strict_settings_propagate_to_handles() {
    let backend = MockBackend::default();
    let mut cache = PlanCache::<MockBackend>::from_settings(&CacheSettings {
        binding_mode: BindingMode::Strict,
        ..CacheSettings::default()
    });
    let handle = cache.resolve_variant(&backend, key(1, OpVariant::Plain)).unwrap();
    assert_eq!(handle.binding_mode(), BindingMode::Strict);
}

#[test]
fn resolve_emits_access_build_and_eviction_metrics() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    subscriber::with_default(subscriber, || {
        let backend = MockBackend::default();
        let mut cache = PlanCache::<MockBackend>::with_policy(EvictionPolicy::lru(capacity(1)));
        plan_id(&mut cache, &backend, key(1, OpVariant::Plain));
        plan_id(&mut cache, &backend, key(1, OpVariant::Plain));
        plan_id(&mut cache, &backend, key(2, OpVariant::Plain));
    });

    let events: Vec<_> = receiver.try_iter().collect();
    let kinds: Vec<&str> = events.iter().map(|enriched| enriched.event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "plan_cache_access",
            "plan_built",
            "plan_cache_access",
            "plan_cache_access",
            "plan_built",
            "plan_cache_eviction",
        ]
    );
    assert!(events.iter().all(|enriched| enriched.span_name.as_deref() == Some("plan_cache_resolve")));
    assert_eq!(events[0].span_fields.as_deref(), Some("cache=\"mock\""));
    match &events[5].event {
        MetricEvent::PlanCacheEviction { strategy, size_after, .. } => {
            assert_eq!(strategy, "lru");
            assert_eq!(*size_after, 0);
        }
        other => panic!("expected eviction, got {other:?}"),
    }
}

#[test]
fn summary_is_emitted_every_hundred_lookups() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    subscriber::with_default(subscriber, || {
        let backend = MockBackend::default();
        let mut cache = PlanCache::<MockBackend>::new();
        for _ in 0..100 {
            plan_id(&mut cache, &backend, key(1, OpVariant::Plain));
        }
    });

    let summaries: Vec<_> = receiver
        .try_iter()
        .filter_map(|enriched| match enriched.event {
            MetricEvent::PlanCacheSummary { hits, misses, size, .. } => Some((hits, misses, size)),
            _ => None,
        })
        .collect();
    assert_eq!(summaries, vec![(99, 1, 1)]);
}
