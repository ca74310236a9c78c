//! Plan wrapper: layout introspection plus handle rebinding.

use primcache_instrumentation::{MetricEvent, record_metric};

use crate::args::{ArgRole, MdKind, Query};
use crate::backend::{CompiledPlan, KernelBackend, MemoryObject};
use crate::bindings::{ArgBindings, BindingCounters, BindingMode};
use crate::error::PlanError;
use crate::key::OpKey;
use crate::types::{DataHandle, MemoryDesc, MemoryKind};

/// Owns one compiled plan and the memory objects bound to its arguments.
///
/// A role's layout is derived from the plan the first time the role is bound;
/// later calls only replace the data handle.
pub struct PlanHandle<B: KernelBackend> {
    key: OpKey,
    plan: B::Plan,
    bindings: ArgBindings<B::Memory>,
    mode: BindingMode,
}

impl<B: KernelBackend> PlanHandle<B> {
    pub fn new(key: OpKey, plan: B::Plan, mode: BindingMode) -> Self {
        Self {
            key,
            plan,
            bindings: ArgBindings::default(),
            mode,
        }
    }

    #[inline]
    pub fn key(&self) -> &OpKey {
        &self.key
    }

    #[inline]
    pub fn plan(&self) -> &B::Plan {
        &self.plan
    }

    #[inline]
    pub fn impl_info(&self) -> &str {
        self.plan.impl_info()
    }

    #[inline]
    pub fn binding_mode(&self) -> BindingMode {
        self.mode
    }

    pub fn set_binding_mode(&mut self, mode: BindingMode) {
        self.mode = mode;
    }

    /// Memory descriptor answering `query` for the `index`-th parameter.
    ///
    /// Non-descriptor queries fail with [`PlanError::InvalidQuery`]. A
    /// parameter the plan does not have yields [`MemoryDesc::zero`].
    pub fn descriptor(&self, query: Query, index: usize) -> Result<MemoryDesc, PlanError> {
        let kind = query.md_kind().ok_or(PlanError::InvalidQuery(query))?;
        Ok(self.plan.query_md(kind, index))
    }

    pub fn src_desc(&self, index: usize) -> MemoryDesc {
        self.plan.query_md(MdKind::Src, index)
    }

    pub fn weights_desc(&self, index: usize) -> MemoryDesc {
        self.plan.query_md(MdKind::Weights, index)
    }

    pub fn dst_desc(&self, index: usize) -> MemoryDesc {
        self.plan.query_md(MdKind::Dst, index)
    }

    pub fn diff_src_desc(&self, index: usize) -> MemoryDesc {
        self.plan.query_md(MdKind::DiffSrc, index)
    }

    pub fn diff_weights_desc(&self, index: usize) -> MemoryDesc {
        self.plan.query_md(MdKind::DiffWeights, index)
    }

    pub fn diff_dst_desc(&self, index: usize) -> MemoryDesc {
        self.plan.query_md(MdKind::DiffDst, index)
    }

    pub fn workspace_desc(&self) -> MemoryDesc {
        self.plan.query_md(MdKind::Workspace, 0)
    }

    pub fn scratchpad_desc(&self) -> MemoryDesc {
        self.plan.query_md(MdKind::Scratchpad, 0)
    }

    /// Layout of the memory expected for `role`. Bound roles answer from
    /// their memory object instead of asking the plan again.
    pub fn arg_descriptor(&self, role: ArgRole) -> MemoryDesc {
        match self.bindings.get(role) {
            Some(memory) => memory.desc().clone(),
            None => self.plan.arg_md(role),
        }
    }

    /// Bind `args` and run the plan.
    ///
    /// New roles get a memory object shaped by the plan's descriptor; bound
    /// roles only get the new handle. Roles bound by an earlier call and not
    /// named here are passed again unchanged, unless the handle is in
    /// [`BindingMode::Strict`]. If binding fails nothing changes.
    ///
    /// # Safety
    /// Every handle passed now or carried forward from an earlier call must
    /// point to live memory at least [`MemoryDesc::size_bytes`] long for its
    /// role, and written arguments must not be aliased by anything else for
    /// the duration of the call.
    pub unsafe fn execute(&mut self, stream: &B::Stream, engine: &B::Engine, args: &[(ArgRole, DataHandle)]) -> Result<(), PlanError> {
        let plan = &self.plan;
        let staged = self.bindings.stage(args, self.mode, |role, handle| {
            let md = plan.arg_md(role);
            if md.is_zero() {
                return Err(PlanError::UnsupportedArgument(role));
            }
            B::make_memory(engine, &md, MemoryKind::Usm, handle)
        })?;
        for role in self.bindings.commit(staged) {
            record_metric!(MetricEvent::ArgumentMemoryCreated {
                plan: self.key.to_string(),
                role: role.to_string(),
                bytes: self.arg_descriptor(role).size_bytes().unwrap_or_default() as u64,
            });
        }

        // SAFETY: forwarded from this function's contract.
        unsafe { self.plan.execute(stream, self.bindings.exec_args())? };
        self.bindings.record_execution();
        Ok(())
    }

    #[inline]
    pub fn binding_counters(&self) -> BindingCounters {
        self.bindings.counters()
    }

    pub fn bound_roles(&self) -> Vec<ArgRole> {
        self.bindings.roles()
    }

    /// Currently bound handle for `role`.
    pub fn bound_handle(&self, role: ArgRole) -> Option<DataHandle> {
        self.bindings.get(role).map(MemoryObject::data_handle)
    }

    /// Forget every bound memory object; the next call derives layouts again.
    pub fn reset_bindings(&mut self) {
        self.bindings.clear();
    }
}

impl<B: KernelBackend> std::fmt::Debug for PlanHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanHandle")
            .field("backend", &B::NAME)
            .field("key", &self.key)
            .field("impl", &self.plan.impl_info())
            .field("bound", &self.bindings.roles())
            .field("mode", &self.mode)
            .finish()
    }
}
