use std::sync::Arc;

use half::{bf16, f16};

use super::int4::{nibble, sign_extend_s4};
use super::probe::HostProbe;
use super::{HostMemory, HostStream};
use crate::args::{ArgRole, MdKind, Operand};
use crate::backend::{CompiledPlan, MemoryObject, standard_arg_md};
use crate::bindings::ExecArgs;
use crate::config::{Activation, BinaryAlg, PlanConfig, PostOp, ScratchpadMode};
use crate::error::PlanError;
use crate::key::{Granularity, OpKey, QuantParam};
use crate::types::{DataHandle, DataType, MemoryDesc, TensorDesc};

const SCALE_DTYPES: &[DataType] = &[DataType::F32, DataType::F16];
const ZERO_POINT_DTYPES: &[DataType] = &[DataType::U8, DataType::S8, DataType::S32];

#[derive(Debug, Clone)]
struct QuantArg {
    md: MemoryDesc,
    granularity: Granularity,
}

/// `dst[M,N] = post_ops(src[M,K] x dequant(weights[K,N]))`.
///
/// Weights are dequantized as `(q - zero_point) * scale`. Operands are read
/// through their descriptor strides, so column-major operands work too.
#[derive(Debug)]
pub struct HostMatmulPlan {
    m: usize,
    k: usize,
    n: usize,
    src: MemoryDesc,
    weights: MemoryDesc,
    dst: MemoryDesc,
    scales: Option<QuantArg>,
    zero_points: Option<QuantArg>,
    post_ops: Vec<PostOp>,
    binary_src: Option<(u8, MemoryDesc)>,
    scratchpad: MemoryDesc,
    probe: Arc<HostProbe>,
    impl_info: String,
}

fn matrix_dims(desc: &TensorDesc, name: &str) -> Result<(usize, usize), PlanError> {
    match desc.dims.as_slice() {
        &[rows, cols] => Ok((rows, cols)),
        other => Err(PlanError::InvalidShape(format!("{name} must be 2-D, got {other:?}"))),
    }
}

/// Memory descriptor for `desc`, rejecting shapes whose byte size overflows.
fn sized_desc(md: MemoryDesc, name: &str) -> Result<MemoryDesc, PlanError> {
    match md.size_bytes() {
        Some(_) => Ok(md),
        None => Err(PlanError::InvalidShape(format!("{name} {:?} exceeds addressable memory", md.dims()))),
    }
}

fn require_float(desc: &TensorDesc, operation: &'static str) -> Result<(), PlanError> {
    if desc.dtype.is_float() {
        Ok(())
    } else {
        Err(PlanError::UnsupportedDtype {
            operation,
            dtype: desc.dtype,
        })
    }
}

fn quant_arg(param: QuantParam, k: usize, n: usize, operation: &'static str, allowed: &[DataType]) -> Result<QuantArg, PlanError> {
    if !allowed.contains(&param.dtype) {
        return Err(PlanError::UnsupportedDtype {
            operation,
            dtype: param.dtype,
        });
    }
    let dims = param
        .granularity
        .param_dims(k, n)
        .ok_or_else(|| PlanError::InvalidShape(format!("{operation}: {:?} does not divide k={k}", param.granularity)))?;
    Ok(QuantArg {
        md: sized_desc(MemoryDesc::row_major(&dims, param.dtype), operation)?,
        granularity: param.granularity,
    })
}

impl HostMatmulPlan {
    pub(crate) fn build(key: &OpKey, config: &PlanConfig, probe: Arc<HostProbe>) -> Result<Self, PlanError> {
        let (src, weights, dst, extra) = match key.operands.as_slice() {
            [src, weights, dst] => (src, weights, dst, None),
            [src, weights, dst, extra] => (src, weights, dst, Some(extra)),
            other => {
                return Err(PlanError::InvalidShape(format!(
                    "matmul expects src, weights, dst and an optional residual, got {} operands",
                    other.len()
                )));
            }
        };

        let (m, k) = matrix_dims(src, "src")?;
        let (weight_k, n) = matrix_dims(weights, "weights")?;
        let (dst_m, dst_n) = matrix_dims(dst, "dst")?;
        if weight_k != k || dst_m != m || dst_n != n {
            return Err(PlanError::InvalidShape(format!("{src} x {weights} cannot produce {dst}")));
        }
        require_float(src, "matmul src")?;
        require_float(dst, "matmul dst")?;
        if !weights.dtype.is_quantized_weight() {
            return Err(PlanError::UnsupportedDtype {
                operation: "matmul weights",
                dtype: weights.dtype,
            });
        }

        let binary_positions: Vec<usize> = config.binary_positions().collect();
        let binary_src = match (binary_positions.as_slice(), extra) {
            ([], None) => None,
            ([position], Some(residual)) => {
                if matrix_dims(residual, "residual")? != (m, n) {
                    return Err(PlanError::InvalidShape(format!("residual {residual} does not match dst {dst}")));
                }
                require_float(residual, "matmul residual")?;
                let position = u8::try_from(*position)
                    .map_err(|_| PlanError::UnsupportedPostOp(format!("binary post-op at position {position}")))?;
                Some((position, sized_desc(residual.memory_desc(), "residual")?))
            }
            ([], Some(residual)) => {
                return Err(PlanError::UnsupportedPostOp(format!("operand {residual} has no binary post-op to feed")));
            }
            (positions, _) => {
                return Err(PlanError::UnsupportedPostOp(format!(
                    "{} binary post-ops but {} extra operands",
                    positions.len(),
                    usize::from(extra.is_some())
                )));
            }
        };

        let scales = key
            .decorations
            .scales
            .map(|param| quant_arg(param, k, n, "weight scales", SCALE_DTYPES))
            .transpose()?;
        let zero_points = key
            .decorations
            .zero_points
            .map(|param| quant_arg(param, k, n, "weight zero points", ZERO_POINT_DTYPES))
            .transpose()?;

        let scratchpad = match config.scratchpad_mode() {
            ScratchpadMode::Library => MemoryDesc::zero(),
            ScratchpadMode::User => sized_desc(MemoryDesc::row_major(&[n], DataType::F32), "scratchpad")?,
        };
        let src_md = sized_desc(src.memory_desc(), "src")?;
        let weights_md = sized_desc(weights.memory_desc(), "weights")?;
        let dst_md = sized_desc(dst.memory_desc(), "dst")?;

        let impl_info = format!("host:matmul:{}x{}x{}:{}->{}", m, k, n, weights.dtype, dst.dtype);
        tracing::trace!(impl_info = %impl_info, post_ops = config.post_ops().len(), "built host plan");

        Ok(Self {
            m,
            k,
            n,
            src: src_md,
            weights: weights_md,
            dst: dst_md,
            scales,
            zero_points,
            post_ops: config.post_ops().to_vec(),
            binary_src,
            scratchpad,
            probe,
            impl_info,
        })
    }

    #[inline]
    pub fn post_ops(&self) -> &[PostOp] {
        &self.post_ops
    }
}

impl CompiledPlan for HostMatmulPlan {
    type Stream = HostStream;
    type Memory = HostMemory;

    fn query_md(&self, kind: MdKind, index: usize) -> MemoryDesc {
        match (kind, index) {
            (MdKind::Src, 0) => self.src.clone(),
            (MdKind::Weights, 0) => self.weights.clone(),
            (MdKind::Dst, 0) => self.dst.clone(),
            (MdKind::Scratchpad, 0) => self.scratchpad.clone(),
            _ => MemoryDesc::zero(),
        }
    }

    fn exec_arg_md(&self, role: ArgRole) -> MemoryDesc {
        let found = match role {
            ArgRole::Scales(Operand::Weights) => self.scales.as_ref().map(|arg| &arg.md),
            ArgRole::ZeroPoints(Operand::Weights) => self.zero_points.as_ref().map(|arg| &arg.md),
            ArgRole::PostOpSrc(position) => self
                .binary_src
                .as_ref()
                .filter(|(bound_at, _)| *bound_at == position)
                .map(|(_, md)| md),
            _ => None,
        };
        found.cloned().unwrap_or_default()
    }

    fn arg_md(&self, role: ArgRole) -> MemoryDesc {
        self.probe.arg_md_derived();
        standard_arg_md(self, role)
    }

    fn impl_info(&self) -> &str {
        &self.impl_info
    }

    unsafe fn execute(&self, _stream: &HostStream, args: &ExecArgs<HostMemory>) -> Result<(), PlanError> {
        let src = args.require(ArgRole::SRC)?.data_handle();
        let weights = args.require(ArgRole::WEIGHTS)?.data_handle();
        let dst = args.require(ArgRole::DST)?.data_handle();
        let scales = self
            .scales
            .as_ref()
            .map(|arg| args.require(ArgRole::Scales(Operand::Weights)).map(|mem| (arg, mem.data_handle())))
            .transpose()?;
        let zero_points = self
            .zero_points
            .as_ref()
            .map(|arg| args.require(ArgRole::ZeroPoints(Operand::Weights)).map(|mem| (arg, mem.data_handle())))
            .transpose()?;
        let binary = self
            .binary_src
            .as_ref()
            .map(|(position, md)| args.require(ArgRole::PostOpSrc(*position)).map(|mem| (md, mem.data_handle())))
            .transpose()?;
        let mut row = if self.scratchpad.is_zero() {
            Row::Owned(vec![0.0; self.n])
        } else {
            Row::User(args.require(ArgRole::Scratchpad)?.data_handle())
        };
        self.probe.executed();

        for i in 0..self.m {
            for j in 0..self.n {
                let mut acc = 0.0f32;
                for kk in 0..self.k {
                    // SAFETY: the caller guarantees every bound handle covers its descriptor.
                    let (a, w) = unsafe {
                        let a = load_float(src, self.src.dtype(), self.src.offset(&[i, kk]));
                        (a, self.dequantize(weights, scales, zero_points, kk, j))
                    };
                    acc += a * w;
                }
                // SAFETY: as above; the user scratchpad holds `n` f32 values.
                unsafe { row.set(j, acc) };
            }

            for j in 0..self.n {
                // SAFETY: as above.
                let mut value = unsafe { row.get(j) };
                for (position, op) in self.post_ops.iter().enumerate() {
                    value = match *op {
                        PostOp::Eltwise(activation) => activate(activation, value),
                        PostOp::Binary { alg } => {
                            let Some((md, handle)) = binary else {
                                return Err(PlanError::MissingArgument(ArgRole::PostOpSrc(position as u8)));
                            };
                            // SAFETY: as above.
                            let other = unsafe { load_float(handle, md.dtype(), md.offset(&[i, j])) };
                            match alg {
                                BinaryAlg::Add => value + other,
                                BinaryAlg::Mul => value * other,
                            }
                        }
                    };
                }
                // SAFETY: as above; dst is the only argument written.
                unsafe { store_float(dst, self.dst.dtype(), self.dst.offset(&[i, j]), value) };
            }
        }
        Ok(())
    }
}

impl HostMatmulPlan {
    /// # Safety
    /// The handles must cover the plan's weight, scale and zero-point descriptors.
    unsafe fn dequantize(
        &self,
        weights: DataHandle,
        scales: Option<(&QuantArg, DataHandle)>,
        zero_points: Option<(&QuantArg, DataHandle)>,
        row: usize,
        col: usize,
    ) -> f32 {
        unsafe {
            let q = load_int(weights, self.weights.dtype(), self.weights.offset(&[row, col]));
            let zero_point = zero_points.map_or(0, |(arg, handle)| {
                load_int(handle, arg.md.dtype(), arg.granularity.param_index(row, col, self.n))
            });
            let scale = scales.map_or(1.0, |(arg, handle)| {
                load_float(handle, arg.md.dtype(), arg.granularity.param_index(row, col, self.n))
            });
            (q - zero_point) as f32 * scale
        }
    }
}

/// Per-row accumulator: plan-owned, or the caller's scratchpad in user mode.
enum Row {
    Owned(Vec<f32>),
    User(DataHandle),
}

impl Row {
    unsafe fn get(&self, j: usize) -> f32 {
        match self {
            Row::Owned(values) => values[j],
            Row::User(handle) => unsafe { load_float(*handle, DataType::F32, j) },
        }
    }

    unsafe fn set(&mut self, j: usize, value: f32) {
        match self {
            Row::Owned(values) => values[j] = value,
            Row::User(handle) => unsafe { store_float(*handle, DataType::F32, j, value) },
        }
    }
}

fn activate(activation: Activation, x: f32) -> f32 {
    match activation {
        Activation::Relu => x.max(0.0),
        Activation::Silu => x / (1.0 + (-x).exp()),
        Activation::Gelu => {
            const SQRT_2_OVER_PI: f32 = 0.797_884_6;
            0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
        }
        Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        Activation::Tanh => x.tanh(),
    }
}

unsafe fn load_float(handle: DataHandle, dtype: DataType, elem: usize) -> f32 {
    let base = handle.cast::<u8>();
    unsafe {
        match dtype {
            DataType::F32 => base.add(elem * 4).cast::<f32>().read_unaligned(),
            DataType::F16 => base.add(elem * 2).cast::<f16>().read_unaligned().to_f32(),
            DataType::Bf16 => base.add(elem * 2).cast::<bf16>().read_unaligned().to_f32(),
            other => load_int(handle, other, elem) as f32,
        }
    }
}

unsafe fn load_int(handle: DataHandle, dtype: DataType, elem: usize) -> i32 {
    let base = handle.cast::<u8>();
    unsafe {
        match dtype {
            DataType::U8 => i32::from(base.add(elem).read()),
            DataType::S8 => i32::from(base.add(elem).cast::<i8>().read()),
            DataType::S32 => base.add(elem * 4).cast::<i32>().read_unaligned(),
            DataType::U4 => i32::from(nibble(base.add(elem / 2).read(), elem)),
            DataType::S4 => i32::from(sign_extend_s4(nibble(base.add(elem / 2).read(), elem))),
            DataType::F32 | DataType::F16 | DataType::Bf16 => load_float(handle, dtype, elem) as i32,
            DataType::Undef => 0,
        }
    }
}

unsafe fn store_float(handle: DataHandle, dtype: DataType, elem: usize, value: f32) {
    let base = handle.cast::<u8>();
    unsafe {
        match dtype {
            DataType::F32 => base.add(elem * 4).cast::<f32>().write_unaligned(value),
            DataType::F16 => base.add(elem * 2).cast::<f16>().write_unaligned(f16::from_f32(value)),
            DataType::Bf16 => base.add(elem * 2).cast::<bf16>().write_unaligned(bf16::from_f32(value)),
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "plan.test.rs"]
mod tests;
