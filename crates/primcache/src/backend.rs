//! Trait boundary to the kernel library.
//!
//! A backend builds opaque [`CompiledPlan`]s from an [`OpKey`] plus the
//! attributes set by a configuration closure, and wraps caller data handles in
//! [`MemoryObject`]s shaped by the plan's own descriptors.

use crate::args::{ArgRole, MdKind, Operand};
use crate::bindings::ExecArgs;
use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::key::OpKey;
use crate::types::{DataHandle, MemoryDesc, MemoryKind};

/// A backend memory object: a descriptor plus a rebindable data address.
pub trait MemoryObject {
    fn desc(&self) -> &MemoryDesc;
    fn data_handle(&self) -> DataHandle;
    fn set_data_handle(&mut self, handle: DataHandle);
}

/// An immutable, constructed execution plan.
pub trait CompiledPlan {
    type Stream;
    type Memory: MemoryObject;

    /// Descriptor of the `index`-th parameter of `kind`; [`MemoryDesc::zero`] when absent.
    fn query_md(&self, kind: MdKind, index: usize) -> MemoryDesc;

    /// Descriptor for roles with no dedicated [`MdKind`], such as decorations and post-op inputs.
    fn exec_arg_md(&self, role: ArgRole) -> MemoryDesc {
        let _ = role;
        MemoryDesc::zero()
    }

    /// Descriptor of the memory expected for `role`.
    fn arg_md(&self, role: ArgRole) -> MemoryDesc {
        standard_arg_md(self, role)
    }

    fn impl_info(&self) -> &str;

    /// Run the plan with the bound arguments.
    ///
    /// # Safety
    /// Every handle in `args` must point to live memory at least as large as its
    /// descriptor, and nothing else may access the written arguments while the
    /// call runs.
    unsafe fn execute(&self, stream: &Self::Stream, args: &ExecArgs<Self::Memory>) -> Result<(), PlanError>;
}

/// Role to descriptor mapping shared by every plan: primary operands go
/// through [`CompiledPlan::query_md`], everything else through
/// [`CompiledPlan::exec_arg_md`].
pub fn standard_arg_md<P: CompiledPlan + ?Sized>(plan: &P, role: ArgRole) -> MemoryDesc {
    match role {
        ArgRole::Data(Operand::Src) => plan.query_md(MdKind::Src, 0),
        ArgRole::Data(Operand::Weights) => plan.query_md(MdKind::Weights, 0),
        ArgRole::Data(Operand::Bias) => plan.query_md(MdKind::Weights, 1),
        ArgRole::Data(Operand::Dst) => plan.query_md(MdKind::Dst, 0),
        ArgRole::Workspace => plan.query_md(MdKind::Workspace, 0),
        ArgRole::Scratchpad => plan.query_md(MdKind::Scratchpad, 0),
        other => plan.exec_arg_md(other),
    }
}

/// A kernel library able to build and run plans.
pub trait KernelBackend: 'static {
    /// Cache name used in metrics and spans.
    const NAME: &'static str;

    type Engine: 'static;
    type Stream: 'static;
    type Memory: MemoryObject + 'static;
    type Plan: CompiledPlan<Stream = Self::Stream, Memory = Self::Memory> + 'static;

    fn build_plan(&self, key: &OpKey, config: &PlanConfig) -> Result<Self::Plan, PlanError>;

    fn make_memory(engine: &Self::Engine, md: &MemoryDesc, kind: MemoryKind, handle: DataHandle) -> Result<Self::Memory, PlanError>;
}
