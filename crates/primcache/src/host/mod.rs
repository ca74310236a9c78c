//! Host CPU reference backend.
//!
//! Implements an int4/int8-weight matmul with optional scale and zero-point
//! decorations and a post-op chain, so the plan cache and binding protocol can
//! run end to end without an accelerator.

pub mod int4;
pub mod plan;
pub mod probe;

use std::sync::Arc;

pub use int4::{pack_s4, pack_u4};
pub use plan::HostMatmulPlan;
pub use probe::{HostProbe, ProbeSnapshot};

use crate::backend::{KernelBackend, MemoryObject};
use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::key::OpKey;
use crate::types::{DataHandle, MemoryDesc, MemoryKind};

/// Builds [`HostMatmulPlan`]s and counts what it does in a shared [`HostProbe`].
#[derive(Debug, Clone, Default)]
pub struct HostBackend {
    probe: Arc<HostProbe>,
}

impl HostBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn probe(&self) -> &Arc<HostProbe> {
        &self.probe
    }

    /// An engine reporting into this backend's probe.
    pub fn engine(&self) -> HostEngine {
        HostEngine {
            probe: Arc::clone(&self.probe),
        }
    }

    pub fn stream(&self) -> HostStream {
        HostStream
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostEngine {
    probe: Arc<HostProbe>,
}

/// Host execution is synchronous; the stream carries no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostStream;

#[derive(Debug)]
pub struct HostMemory {
    desc: MemoryDesc,
    handle: DataHandle,
    kind: MemoryKind,
}

impl HostMemory {
    #[inline]
    pub fn kind(&self) -> MemoryKind {
        self.kind
    }
}

impl MemoryObject for HostMemory {
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

impl KernelBackend for HostBackend {
    const NAME: &'static str = "host";

    type Engine = HostEngine;
    type Stream = HostStream;
    type Memory = HostMemory;
    type Plan = HostMatmulPlan;

    fn build_plan(&self, key: &OpKey, config: &PlanConfig) -> Result<HostMatmulPlan, PlanError> {
        let plan = HostMatmulPlan::build(key, config, Arc::clone(&self.probe))?;
        self.probe.plan_built();
        Ok(plan)
    }

    fn make_memory(engine: &HostEngine, md: &MemoryDesc, kind: MemoryKind, handle: DataHandle) -> Result<HostMemory, PlanError> {
        engine.probe.memory_created();
        Ok(HostMemory {
            desc: md.clone(),
            handle,
            kind,
        })
    }
}
