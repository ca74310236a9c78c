use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by a [`HostBackend`](super::HostBackend), its engines and its plans.
#[derive(Debug, Default)]
pub struct HostProbe {
    plans_built: AtomicU64,
    arg_md_derivations: AtomicU64,
    memory_created: AtomicU64,
    executions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSnapshot {
    pub plans_built: u64,
    pub arg_md_derivations: u64,
    pub memory_created: u64,
    pub executions: u64,
}

impl HostProbe {
    #[inline]
    pub(crate) fn plan_built(&self) {
        self.plans_built.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn arg_md_derived(&self) {
        self.arg_md_derivations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn memory_created(&self) {
        self.memory_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn executed(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            plans_built: self.plans_built.load(Ordering::Relaxed),
            arg_md_derivations: self.arg_md_derivations.load(Ordering::Relaxed),
            memory_created: self.memory_created.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
        }
    }
}
