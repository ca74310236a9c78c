//! Safe entry points for the int4-weight matmul family.
//!
//! Each call derives an [`OpKey`] from its tensors, resolves it through the
//! calling thread's plan cache and checks every buffer against the plan's
//! descriptor before executing, so no caller-supplied slice is ever read or
//! written past its end.

use bytemuck::Pod;
use smallvec::SmallVec;

use crate::args::{ArgRole, Operand};
use crate::backend::KernelBackend;
use crate::config::Activation;
use crate::context::with_plan_cache;
use crate::error::PlanError;
use crate::key::{Granularity, OpKey, QuantParam};
use crate::types::{DataHandle, DataType, TensorDesc};
use crate::variant::OpVariant;

/// Read-only tensor: raw bytes plus the layout they are read with.
#[derive(Debug, Clone, Copy)]
pub struct TensorArg<'a> {
    bytes: &'a [u8],
    desc: &'a TensorDesc,
}

impl<'a> TensorArg<'a> {
    pub fn new<T: Pod>(data: &'a [T], desc: &'a TensorDesc) -> Self {
        Self::from_bytes(bytemuck::cast_slice(data), desc)
    }

    /// Packed data such as int4 weights, two values per byte.
    pub fn from_bytes(bytes: &'a [u8], desc: &'a TensorDesc) -> Self {
        Self { bytes, desc }
    }

    #[inline]
    pub fn desc(&self) -> &TensorDesc {
        self.desc
    }

    fn handle(&self) -> DataHandle {
        DataHandle::from_const(self.bytes.as_ptr())
    }
}

/// Writable tensor, used for the output.
#[derive(Debug)]
pub struct TensorArgMut<'a> {
    bytes: &'a mut [u8],
    desc: &'a TensorDesc,
}

impl<'a> TensorArgMut<'a> {
    pub fn new<T: Pod>(data: &'a mut [T], desc: &'a TensorDesc) -> Self {
        Self {
            bytes: bytemuck::cast_slice_mut(data),
            desc,
        }
    }

    #[inline]
    pub fn desc(&self) -> &TensorDesc {
        self.desc
    }
}

/// Scale or zero-point values for the weights.
#[derive(Debug, Clone, Copy)]
pub struct Quantization<'a> {
    bytes: &'a [u8],
    param: QuantParam,
}

impl<'a> Quantization<'a> {
    /// `dtype` names how the plan reads `values`; it is not inferred from `T`.
    pub fn new<T: Pod>(values: &'a [T], granularity: Granularity, dtype: DataType) -> Self {
        Self {
            bytes: bytemuck::cast_slice(values),
            param: QuantParam::new(granularity, dtype),
        }
    }
}

/// Operands of `dst = post_ops(src x dequant(weights))`.
#[derive(Debug)]
pub struct Int4MatmulArgs<'a> {
    pub src: TensorArg<'a>,
    pub weights: TensorArg<'a>,
    pub scales: Option<Quantization<'a>>,
    pub zero_points: Option<Quantization<'a>>,
    pub dst: TensorArgMut<'a>,
    /// Only read by the residual-add variants.
    pub residual: Option<TensorArg<'a>>,
}

impl Int4MatmulArgs<'_> {
    fn key(&self, variant: OpVariant) -> OpKey {
        let operands = [self.src.desc, self.weights.desc, self.dst.desc]
            .into_iter()
            .chain(self.residual.as_ref().map(|residual| residual.desc))
            .cloned();
        let mut key = OpKey::new(operands, variant);
        if let Some(scales) = &self.scales {
            key = key.with_scales(scales.param);
        }
        if let Some(zero_points) = &self.zero_points {
            key = key.with_zero_points(zero_points.param);
        }
        key
    }

    /// `(role, buffer length, handle)` for every supplied argument.
    fn bindings(&mut self, variant: OpVariant) -> Result<SmallVec<[(ArgRole, usize, DataHandle); 8]>, PlanError> {
        let mut bindings = SmallVec::new();
        bindings.push((ArgRole::SRC, self.src.bytes.len(), self.src.handle()));
        bindings.push((ArgRole::WEIGHTS, self.weights.bytes.len(), self.weights.handle()));
        bindings.push((
            ArgRole::DST,
            self.dst.bytes.len(),
            DataHandle::from_mut(self.dst.bytes.as_mut_ptr()),
        ));
        if let Some(scales) = &self.scales {
            bindings.push((
                ArgRole::Scales(Operand::Weights),
                scales.bytes.len(),
                DataHandle::from_const(scales.bytes.as_ptr()),
            ));
        }
        if let Some(zero_points) = &self.zero_points {
            bindings.push((
                ArgRole::ZeroPoints(Operand::Weights),
                zero_points.bytes.len(),
                DataHandle::from_const(zero_points.bytes.as_ptr()),
            ));
        }
        match (variant.residual_role(), &self.residual) {
            (Some(role), Some(residual)) => bindings.push((role, residual.bytes.len(), residual.handle())),
            (Some(role), None) => return Err(PlanError::MissingArgument(role)),
            (None, Some(_)) => return Err(PlanError::UnsupportedArgument(ArgRole::PostOpSrc(0))),
            (None, None) => {}
        }
        Ok(bindings)
    }
}

/// `dst = src x dequant(weights)`.
pub fn matmul_int4<B: KernelBackend>(backend: &B, engine: &B::Engine, stream: &B::Stream, args: Int4MatmulArgs<'_>) -> Result<(), PlanError> {
    run(backend, engine, stream, OpVariant::Plain, args)
}

/// `dst = silu(src x dequant(weights))`.
pub fn matmul_int4_silu<B: KernelBackend>(backend: &B, engine: &B::Engine, stream: &B::Stream, args: Int4MatmulArgs<'_>) -> Result<(), PlanError> {
    run(backend, engine, stream, OpVariant::Activation(Activation::Silu), args)
}

/// `dst = src x dequant(weights) + residual`.
pub fn matmul_int4_resadd<B: KernelBackend>(backend: &B, engine: &B::Engine, stream: &B::Stream, args: Int4MatmulArgs<'_>) -> Result<(), PlanError> {
    run(backend, engine, stream, OpVariant::ResidualAdd, args)
}

fn run<B: KernelBackend>(
    backend: &B,
    engine: &B::Engine,
    stream: &B::Stream,
    variant: OpVariant,
    mut args: Int4MatmulArgs<'_>,
) -> Result<(), PlanError> {
    let bindings = args.bindings(variant)?;
    let key = args.key(variant);
    if let Some(desc) = key.operands.iter().find(|desc| desc.memory_desc().size_bytes().is_none()) {
        return Err(PlanError::InvalidShape(format!("{desc} exceeds addressable memory")));
    }

    with_plan_cache::<B, _>(|cache| {
        let handle = cache.resolve_variant(backend, key)?;

        for &(role, actual, _) in &bindings {
            let expected = handle
                .arg_descriptor(role)
                .size_bytes()
                .ok_or_else(|| PlanError::InvalidShape(format!("{role} exceeds addressable memory")))?;
            if actual < expected {
                return Err(PlanError::BufferTooSmall { role, expected, actual });
            }
        }

        let mut call: SmallVec<[(ArgRole, DataHandle); 8]> = bindings.iter().map(|&(role, _, handle)| (role, handle)).collect();
        let scratchpad_md = handle.scratchpad_desc();
        let scratchpad_bytes = scratchpad_md
            .size_bytes()
            .ok_or_else(|| PlanError::InvalidShape("scratchpad exceeds addressable memory".to_string()))?;
        let mut scratchpad = vec![0u8; scratchpad_bytes];
        if !scratchpad_md.is_zero() {
            call.push((ArgRole::Scratchpad, DataHandle::from_mut(scratchpad.as_mut_ptr())));
        }

        // SAFETY: every buffer was checked against its descriptor above, the
        // output is the only mutable borrow and the scratchpad outlives the call.
        unsafe { handle.execute(stream, engine, &call) }
    })
}

#[cfg(test)]
#[path = "ops.test.rs"]
mod tests;
