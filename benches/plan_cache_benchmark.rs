//! Compares plan-cache hits, misses and the rebind-only execute path on the host backend.

use std::num::NonZeroUsize;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use primcache::caching::{EvictionPolicy, PlanCache};
use primcache::host::{HostBackend, pack_u4};
use primcache::{ArgRole, DataHandle, DataType, OpKey, OpVariant, TensorDesc};
use primcache_cli::workload::ShapeBuffers;

const HIDDEN: usize = 64;

fn key(m: usize) -> OpKey {
    OpKey::new(
        [
            TensorDesc::new([m, HIDDEN], DataType::F32),
            TensorDesc::new([HIDDEN, HIDDEN], DataType::U4),
            TensorDesc::new([m, HIDDEN], DataType::F32),
        ],
        OpVariant::Plain,
    )
}

fn benchmark_resolve(c: &mut Criterion) {
    let backend = HostBackend::new();
    let mut group = c.benchmark_group("plan_cache_resolve");

    group.bench_function("hit", |b| {
        let mut cache = PlanCache::<HostBackend>::new();
        cache.resolve_variant(&backend, key(1)).unwrap();
        b.iter(|| {
            let handle = cache.resolve_variant(&backend, key(1)).unwrap();
            std::hint::black_box(handle.impl_info().len());
        })
    });

    group.bench_function("miss", |b| {
        b.iter_batched(
            || PlanCache::<HostBackend>::with_policy(EvictionPolicy::lru(NonZeroUsize::new(1).unwrap())),
            |mut cache| {
                let handle = cache.resolve_variant(&backend, key(1)).unwrap();
                std::hint::black_box(handle.impl_info().len());
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn benchmark_execute(c: &mut Criterion) {
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let mut group = c.benchmark_group("plan_execute");

    let src = vec![0.5f32; HIDDEN];
    let weights = pack_u4(&vec![3u8; HIDDEN * HIDDEN]);
    let mut dst = vec![0.0f32; HIDDEN];
    let mut cache = PlanCache::<HostBackend>::new();
    let handle = cache.resolve_variant(&backend, key(1)).unwrap();
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

    group.bench_function("rebind_src", |b| {
        b.iter(|| unsafe {
            handle
                .execute(&stream, &engine, &[(ArgRole::SRC, DataHandle::from_const(src.as_ptr()))])
                .unwrap();
        })
    });

    let mut buffers = ShapeBuffers::new(1, HIDDEN);
    group.bench_function("ops_entry_point", |b| {
        b.iter(|| buffers.run(&backend, OpVariant::Plain).unwrap())
    });

    group.finish();
}

criterion_group!(benches, benchmark_resolve, benchmark_execute);
criterion_main!(benches);
