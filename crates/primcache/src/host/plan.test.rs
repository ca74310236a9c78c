use super::*;
use crate::args::Query;
use crate::backend::KernelBackend;
use crate::bindings::BindingMode;
use crate::host::{HostBackend, pack_s4, pack_u4};
use crate::plan::PlanHandle;
use crate::variant::OpVariant;

fn f32s(rows: usize, cols: usize) -> TensorDesc {
    TensorDesc::new([rows, cols], DataType::F32)
}

fn handle_for(backend: &HostBackend, key: OpKey, config: &PlanConfig) -> PlanHandle<HostBackend> {
    let plan = backend.build_plan(&key, config).expect("plan should build");
    PlanHandle::new(key, plan, BindingMode::CarryForward)
}

fn configured(variant: OpVariant) -> PlanConfig {
    let mut config = PlanConfig::default();
    variant.configure(&mut config).unwrap();
    config
}

#[test]
fn dequantizes_with_channel_scales_and_tensor_zero_point() {
    let backend = HostBackend::new();
    let key = OpKey::new([f32s(1, 2), TensorDesc::new([2, 2], DataType::U4), f32s(1, 2)], OpVariant::Plain)
        .with_scales(QuantParam::new(Granularity::PerChannel, DataType::F32))
        .with_zero_points(QuantParam::new(Granularity::PerTensor, DataType::U8));
    let mut handle = handle_for(&backend, key, &PlanConfig::default());

    let src = [1.0f32, 2.0];
    let weights = pack_u4(&[1, 2, 3, 4]);
    let scales = [0.5f32, 2.0];
    let zero_points = [1u8];
    let mut dst = [0.0f32; 2];

    unsafe {
        handle
            .execute(
                &backend.stream(),
                &backend.engine(),
                &[
                    (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
                    (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
                    (ArgRole::Scales(Operand::Weights), DataHandle::from_const(scales.as_ptr())),
                    (ArgRole::ZeroPoints(Operand::Weights), DataHandle::from_const(zero_points.as_ptr())),
                    (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
                ],
            )
            .unwrap();
    }

    assert_eq!(dst, [2.0, 14.0]);
}

#[test]
fn applies_activation_before_residual_add() {
    let backend = HostBackend::new();
    let variant = OpVariant::ActivationResidual(Activation::Relu);
    let key = OpKey::new(
        [f32s(1, 2), TensorDesc::new([2, 1], DataType::S4), f32s(1, 1), f32s(1, 1)],
        variant,
    );
    let mut handle = handle_for(&backend, key, &configured(variant));

    let src = [1.0f32, 1.0];
    let weights = pack_s4(&[-3, 1]);
    let residual = [5.0f32];
    let mut dst = [0.0f32];

    unsafe {
        handle
            .execute(
                &backend.stream(),
                &backend.engine(),
                &[
                    (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
                    (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
                    (ArgRole::PostOpSrc(1), DataHandle::from_const(residual.as_ptr())),
                    (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
                ],
            )
            .unwrap();
    }

    assert_eq!(dst, [5.0]);
}

#[test]
fn grouped_scales_and_half_precision_output() {
    let backend = HostBackend::new();
    let key = OpKey::new(
        [f32s(1, 4), TensorDesc::new([4, 1], DataType::S8), TensorDesc::new([1, 1], DataType::F16)],
        OpVariant::Plain,
    )
    .with_scales(QuantParam::new(Granularity::Grouped { group: 2 }, DataType::F32));
    let mut handle = handle_for(&backend, key, &PlanConfig::default());
    assert_eq!(
        handle.arg_descriptor(ArgRole::Scales(Operand::Weights)),
        MemoryDesc::row_major(&[2, 1], DataType::F32)
    );

    let src = [1.0f32; 4];
    let weights = [1i8, 2, 3, 4];
    let scales = [1.0f32, 10.0];
    let mut dst = [f16::ZERO];

    unsafe {
        handle
            .execute(
                &backend.stream(),
                &backend.engine(),
                &[
                    (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
                    (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
                    (ArgRole::Scales(Operand::Weights), DataHandle::from_const(scales.as_ptr())),
                    (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
                ],
            )
            .unwrap();
    }

    assert_eq!(dst[0].to_f32(), 73.0);
}

#[test]
fn user_scratchpad_must_be_bound() {
    let backend = HostBackend::new();
    let key = OpKey::new([f32s(1, 1), TensorDesc::new([1, 2], DataType::U8), f32s(1, 2)], OpVariant::Plain);
    let mut config = PlanConfig::default();
    config.set_scratchpad_mode(ScratchpadMode::User);
    let mut handle = handle_for(&backend, key, &config);
    assert_eq!(handle.scratchpad_desc(), MemoryDesc::row_major(&[2], DataType::F32));

    let src = [2.0f32];
    let weights = [3u8, 4];
    let mut dst = [0.0f32; 2];
    let mut scratch = [0.0f32; 2];
    let base = [
        (ArgRole::SRC, DataHandle::from_const(src.as_ptr())),
        (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
        (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
    ];

    let missing = unsafe { handle.execute(&backend.stream(), &backend.engine(), &base) };
    assert_eq!(missing, Err(PlanError::MissingArgument(ArgRole::Scratchpad)));

    unsafe {
        handle
            .execute(
                &backend.stream(),
                &backend.engine(),
                &[(ArgRole::Scratchpad, DataHandle::from_mut(scratch.as_mut_ptr()))],
            )
            .unwrap();
    }
    assert_eq!(scratch, [6.0, 8.0]);
    assert_eq!(dst, [6.0, 8.0]);
}

#[test]
fn absent_parameters_report_the_zero_descriptor() {
    let backend = HostBackend::new();
    let key = OpKey::new([f32s(2, 4), TensorDesc::new([4, 3], DataType::U4), f32s(2, 3)], OpVariant::Plain);
    let handle = handle_for(&backend, key, &PlanConfig::default());

    assert!(handle.workspace_desc().is_zero());
    assert!(handle.scratchpad_desc().is_zero());
    assert!(handle.weights_desc(1).is_zero());
    assert!(handle.diff_src_desc(0).is_zero());
    assert!(handle.diff_weights_desc(0).is_zero());
    assert!(handle.diff_dst_desc(0).is_zero());
    assert!(handle.src_desc(1).is_zero());
    assert!(handle.arg_descriptor(ArgRole::Scales(Operand::Weights)).is_zero());
    assert!(handle.arg_descriptor(ArgRole::PostOpSrc(0)).is_zero());
    assert_eq!(handle.weights_desc(0).size_bytes(), Some(6));
    assert_eq!(handle.descriptor(Query::Dst, 0).unwrap(), handle.dst_desc(0));
    assert_eq!(handle.impl_info(), "host:matmul:2x4x3:u4->f32");
}

#[test]
fn build_rejects_inconsistent_keys() {
    let backend = HostBackend::new();
    let plain = PlanConfig::default();
    let u4 = |rows, cols| TensorDesc::new([rows, cols], DataType::U4);

    let mismatched_k = OpKey::new([f32s(2, 4), u4(5, 3), f32s(2, 3)], OpVariant::Plain);
    assert!(matches!(backend.build_plan(&mismatched_k, &plain), Err(PlanError::InvalidShape(_))));

    let float_weights = OpKey::new([f32s(2, 4), f32s(4, 3), f32s(2, 3)], OpVariant::Plain);
    assert!(matches!(
        backend.build_plan(&float_weights, &plain),
        Err(PlanError::UnsupportedDtype { dtype: DataType::F32, .. })
    ));

    let orphan_residual = OpKey::new([f32s(2, 4), u4(4, 3), f32s(2, 3), f32s(2, 3)], OpVariant::Plain);
    assert!(matches!(
        backend.build_plan(&orphan_residual, &plain),
        Err(PlanError::UnsupportedPostOp(_))
    ));

    let missing_residual = OpKey::new([f32s(2, 4), u4(4, 3), f32s(2, 3)], OpVariant::ResidualAdd);
    assert!(matches!(
        backend.build_plan(&missing_residual, &configured(OpVariant::ResidualAdd)),
        Err(PlanError::UnsupportedPostOp(_))
    ));

    let uneven_groups = OpKey::new([f32s(2, 4), u4(4, 3), f32s(2, 3)], OpVariant::Plain)
        .with_scales(QuantParam::new(Granularity::Grouped { group: 3 }, DataType::F32));
    assert!(matches!(backend.build_plan(&uneven_groups, &plain), Err(PlanError::InvalidShape(_))));

    let int_scales = OpKey::new([f32s(2, 4), u4(4, 3), f32s(2, 3)], OpVariant::Plain)
        .with_scales(QuantParam::new(Granularity::PerTensor, DataType::S8));
    assert!(matches!(
        backend.build_plan(&int_scales, &plain),
        Err(PlanError::UnsupportedDtype { dtype: DataType::S8, .. })
    ));

    let unaddressable = OpKey::new([f32s(1 << 62, 1), u4(1, 1), f32s(1 << 62, 1)], OpVariant::Plain);
    assert!(matches!(backend.build_plan(&unaddressable, &plain), Err(PlanError::InvalidShape(_))));

    assert_eq!(backend.probe().snapshot().plans_built, 0);
}

#[test]
fn null_handles_fail_at_execute_time() {
    let backend = HostBackend::new();
    let key = OpKey::new([f32s(1, 2), TensorDesc::new([2, 2], DataType::U4), f32s(1, 2)], OpVariant::Plain);
    let mut handle = handle_for(&backend, key, &PlanConfig::default());
    let weights = pack_u4(&[1, 2, 3, 4]);
    let mut dst = [0.0f32; 2];

    let result = unsafe {
        handle.execute(
            &backend.stream(),
            &backend.engine(),
            &[
                (ArgRole::SRC, DataHandle::null()),
                (ArgRole::WEIGHTS, DataHandle::from_const(weights.as_ptr())),
                (ArgRole::DST, DataHandle::from_mut(dst.as_mut_ptr())),
            ],
        )
    };
    assert_eq!(result, Err(PlanError::NullHandle(ArgRole::SRC)));
    assert_eq!(handle.binding_counters().executions, 0);
    assert_eq!(handle.bound_roles(), vec![ArgRole::SRC, ArgRole::WEIGHTS, ArgRole::DST]);
}
