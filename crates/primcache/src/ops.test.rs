use super::*;
use crate::caching::CacheSettings;
use crate::context::{set_thread_cache_settings, thread_cache_metrics};
use crate::host::{HostBackend, pack_u4};

struct Fixture {
    src: TensorDesc,
    weights: TensorDesc,
    dst: TensorDesc,
    packed: Vec<u8>,
}

/// `[1, 2] x u4 [2, 2]` with weights `[[1, 2], [3, 4]]`.
fn fixture() -> Fixture {
    set_thread_cache_settings::<HostBackend>(&CacheSettings::default());
    Fixture {
        src: TensorDesc::new([1, 2], DataType::F32),
        weights: TensorDesc::new([2, 2], DataType::U4),
        dst: TensorDesc::new([1, 2], DataType::F32),
        packed: pack_u4(&[1, 2, 3, 4]),
    }
}

#[test]
fn repeated_calls_reuse_plan_and_bindings() {
    let fx = fixture();
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let scales = [0.5f32, 2.0];
    let zero_point = [1u8];
    let mut dst = [0.0f32; 2];

    let call = |src: &[f32], dst: &mut [f32]| {
        matmul_int4(
            &backend,
            &engine,
            &stream,
            Int4MatmulArgs {
                src: TensorArg::new(src, &fx.src),
                weights: TensorArg::from_bytes(&fx.packed, &fx.weights),
                scales: Some(Quantization::new(scales.as_slice(), Granularity::PerChannel, DataType::F32)),
                zero_points: Some(Quantization::new(zero_point.as_slice(), Granularity::PerTensor, DataType::U8)),
                dst: TensorArgMut::new(dst, &fx.dst),
                residual: None,
            },
        )
    };

    call(&[1.0, 2.0], &mut dst).unwrap();
    assert_eq!(dst, [2.0, 14.0]);
    let first = backend.probe().snapshot();

    call(&[2.0, 4.0], &mut dst).unwrap();
    assert_eq!(dst, [4.0, 28.0]);
    let second = backend.probe().snapshot();

    assert_eq!(second.plans_built, 1);
    assert_eq!(second.arg_md_derivations, first.arg_md_derivations);
    assert_eq!(second.memory_created, 5);
    assert_eq!(second.executions, 2);

    let metrics = thread_cache_metrics::<HostBackend>().unwrap();
    assert_eq!((metrics.hits, metrics.misses, metrics.size), (1, 1, 1));
}

#[test]
fn silu_and_residual_variants_resolve_distinct_plans() {
    let fx = fixture();
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let src = [1.0f32, 1.0];
    let residual = [10.0f32, -10.0];
    let mut silu_out = [0.0f32; 2];
    let mut resadd_out = [0.0f32; 2];

    matmul_int4_silu(
        &backend,
        &engine,
        &stream,
        Int4MatmulArgs {
            src: TensorArg::new(src.as_slice(), &fx.src),
            weights: TensorArg::from_bytes(&fx.packed, &fx.weights),
            scales: None,
            zero_points: None,
            dst: TensorArgMut::new(silu_out.as_mut_slice(), &fx.dst),
            residual: None,
        },
    )
    .unwrap();
    matmul_int4_resadd(
        &backend,
        &engine,
        &stream,
        Int4MatmulArgs {
            src: TensorArg::new(src.as_slice(), &fx.src),
            weights: TensorArg::from_bytes(&fx.packed, &fx.weights),
            scales: None,
            zero_points: None,
            dst: TensorArgMut::new(resadd_out.as_mut_slice(), &fx.dst),
            residual: Some(TensorArg::new(residual.as_slice(), &fx.dst)),
        },
    )
    .unwrap();

    let silu = |x: f32| x / (1.0 + (-x).exp());
    assert!((silu_out[0] - silu(4.0)).abs() < 1e-5);
    assert!((silu_out[1] - silu(6.0)).abs() < 1e-5);
    assert_eq!(resadd_out, [14.0, -4.0]);
    assert_eq!(thread_cache_metrics::<HostBackend>().unwrap().size, 2);
}

#[test]
fn residual_presence_must_match_the_variant() {
    let fx = fixture();
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let src = [1.0f32, 1.0];
    let residual = [0.0f32; 2];
    let mut dst = [0.0f32; 2];

    let missing = matmul_int4_resadd(
        &backend,
        &engine,
        &stream,
        Int4MatmulArgs {
            src: TensorArg::new(src.as_slice(), &fx.src),
            weights: TensorArg::from_bytes(&fx.packed, &fx.weights),
            scales: None,
            zero_points: None,
            dst: TensorArgMut::new(dst.as_mut_slice(), &fx.dst),
            residual: None,
        },
    );
    assert_eq!(missing, Err(PlanError::MissingArgument(ArgRole::PostOpSrc(0))));

    let unexpected = matmul_int4(
        &backend,
        &engine,
        &stream,
        Int4MatmulArgs {
            src: TensorArg::new(src.as_slice(), &fx.src),
            weights: TensorArg::from_bytes(&fx.packed, &fx.weights),
            scales: None,
            zero_points: None,
            dst: TensorArgMut::new(dst.as_mut_slice(), &fx.dst),
            residual: Some(TensorArg::new(residual.as_slice(), &fx.dst)),
        },
    );
    assert_eq!(unexpected, Err(PlanError::UnsupportedArgument(ArgRole::PostOpSrc(0))));
    assert_eq!(backend.probe().snapshot().plans_built, 0);
}

#[test]
fn short_buffers_are_rejected_before_execution() {
    let fx = fixture();
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let src = [1.0f32, 1.0];
    let mut dst = [0.0f32; 1];

    let result = matmul_int4(
        &backend,
        &engine,
        &stream,
        Int4MatmulArgs {
            src: TensorArg::new(src.as_slice(), &fx.src),
            weights: TensorArg::from_bytes(&fx.packed, &fx.weights),
            scales: None,
            zero_points: None,
            dst: TensorArgMut::new(dst.as_mut_slice(), &fx.dst),
            residual: None,
        },
    );

    assert_eq!(
        result,
        Err(PlanError::BufferTooSmall {
            role: ArgRole::DST,
            expected: 8,
            actual: 4,
        })
    );
    assert_eq!(backend.probe().snapshot().executions, 0);
    assert_eq!(dst, [0.0]);
}

#[test]
fn unaddressable_shapes_are_rejected_before_resolving() {
    fixture();
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let tall = TensorDesc::new([1 << 62, 1], DataType::F32);
    let weights = TensorDesc::new([1, 1], DataType::U4);
    let packed = pack_u4(&[1]);
    let mut dst: [f32; 0] = [];

    let result = matmul_int4(
        &backend,
        &engine,
        &stream,
        Int4MatmulArgs {
            src: TensorArg::new::<f32>(&[], &tall),
            weights: TensorArg::from_bytes(&packed, &weights),
            scales: None,
            zero_points: None,
            dst: TensorArgMut::new(dst.as_mut_slice(), &tall),
            residual: None,
        },
    );

    assert!(matches!(result, Err(PlanError::InvalidShape(_))));
    let snapshot = backend.probe().snapshot();
    assert_eq!((snapshot.plans_built, snapshot.executions), (0, 0));
}

#[test]
fn large_shapes_still_need_full_buffers() {
    fixture();
    let backend = HostBackend::new();
    let (engine, stream) = (backend.engine(), backend.stream());
    let tall = TensorDesc::new([1 << 40, 1], DataType::F32);
    let weights = TensorDesc::new([1, 1], DataType::U4);
    let packed = pack_u4(&[1]);
    let mut dst: [f32; 0] = [];

    let result = matmul_int4(
        &backend,
        &engine,
        &stream,
        Int4MatmulArgs {
            src: TensorArg::new::<f32>(&[], &tall),
            weights: TensorArg::from_bytes(&packed, &weights),
            scales: None,
            zero_points: None,
            dst: TensorArgMut::new(dst.as_mut_slice(), &tall),
            residual: None,
        },
    );

    assert_eq!(
        result,
        Err(PlanError::BufferTooSmall {
            role: ArgRole::SRC,
            expected: 1 << 42,
            actual: 0,
        })
    );
    assert_eq!(backend.probe().snapshot().executions, 0);
}
