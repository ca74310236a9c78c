//! Per-plan argument binding table.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::args::ArgRole;
use crate::backend::MemoryObject;
use crate::error::PlanError;
use crate::types::DataHandle;

/// What happens to roles a call does not mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BindingMode {
    /// Keep the previous handle and pass it to the plan again.
    #[default]
    CarryForward,
    /// Fail with [`PlanError::StaleBinding`].
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BindingCounters {
    /// Memory objects created, one per distinct role ever bound.
    pub memory_created: u64,
    /// Handle swaps on already-bound roles.
    pub rebinds: u64,
    /// Successful plan executions.
    pub executions: u64,
}

/// Full argument set passed to [`CompiledPlan::execute`](crate::backend::CompiledPlan::execute).
#[derive(Debug)]
pub struct ExecArgs<M> {
    map: FxHashMap<ArgRole, M>,
}

impl<M> Default for ExecArgs<M> {
    fn default() -> Self {
        Self { map: FxHashMap::default() }
    }
}

impl<M> ExecArgs<M> {
    #[inline]
    pub fn get(&self, role: ArgRole) -> Option<&M> {
        self.map.get(&role)
    }

    #[inline]
    pub fn contains(&self, role: ArgRole) -> bool {
        self.map.contains_key(&role)
    }

    pub fn insert(&mut self, role: ArgRole, memory: M) -> Option<M> {
        self.map.insert(role, memory)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArgRole, &M)> {
        self.map.iter().map(|(role, memory)| (*role, memory))
    }
}

impl<M: MemoryObject> ExecArgs<M> {
    /// The memory bound to `role`, failing if it is missing or null.
    pub fn require(&self, role: ArgRole) -> Result<&M, PlanError> {
        let memory = self.get(role).ok_or(PlanError::MissingArgument(role))?;
        if memory.data_handle().is_null() {
            return Err(PlanError::NullHandle(role));
        }
        Ok(memory)
    }
}

/// A binding prepared by [`ArgBindings::stage`] but not yet applied.
pub enum Staged<M> {
    Rebind(ArgRole, DataHandle),
    Create(ArgRole, M),
}

impl<M> Staged<M> {
    #[inline]
    fn role(&self) -> ArgRole {
        match self {
            Staged::Rebind(role, _) | Staged::Create(role, _) => *role,
        }
    }
}

pub type StagedBindings<M> = SmallVec<[Staged<M>; 8]>;

/// Role to memory-object table owned by one plan handle.
///
/// Updates go through [`stage`](Self::stage), which may fail without side
/// effects, followed by an infallible [`commit`](Self::commit).
#[derive(Debug)]
pub struct ArgBindings<M> {
    memories: ExecArgs<M>,
    counters: BindingCounters,
}

impl<M> Default for ArgBindings<M> {
    fn default() -> Self {
        Self {
            memories: ExecArgs::default(),
            counters: BindingCounters::default(),
        }
    }
}

impl<M: MemoryObject> ArgBindings<M> {
    /// Plan an update for `bindings`. `create` is called once for every role
    /// that is neither bound nor already staged by an earlier pair.
    pub fn stage<F>(&self, bindings: &[(ArgRole, DataHandle)], mode: BindingMode, mut create: F) -> Result<StagedBindings<M>, PlanError>
    where
        F: FnMut(ArgRole, DataHandle) -> Result<M, PlanError>,
    {
        // The smallest omitted role is reported so the error does not depend on hash order.
        if mode == BindingMode::Strict
            && let Some(stale) = self
                .memories
                .map
                .keys()
                .filter(|role| !bindings.iter().any(|(supplied, _)| supplied == *role))
                .min()
        {
            return Err(PlanError::StaleBinding(*stale));
        }

        let mut staged = StagedBindings::new();
        for &(role, handle) in bindings {
            if self.memories.contains(role) || staged.iter().any(|entry| entry.role() == role) {
                staged.push(Staged::Rebind(role, handle));
            } else {
                staged.push(Staged::Create(role, create(role, handle)?));
            }
        }
        Ok(staged)
    }

    /// Apply staged bindings in order; a later pair for the same role wins.
    /// Returns the roles that got a new memory object.
    pub fn commit(&mut self, staged: StagedBindings<M>) -> SmallVec<[ArgRole; 8]> {
        let mut created = SmallVec::new();
        for entry in staged {
            match entry {
                Staged::Create(role, memory) => {
                    self.memories.insert(role, memory);
                    self.counters.memory_created += 1;
                    created.push(role);
                }
                Staged::Rebind(role, handle) => {
                    if let Some(memory) = self.memories.map.get_mut(&role) {
                        memory.set_data_handle(handle);
                        self.counters.rebinds += 1;
                    }
                }
            }
        }
        created
    }
}

impl<M> ArgBindings<M> {
    #[inline]
    pub fn exec_args(&self) -> &ExecArgs<M> {
        &self.memories
    }

    #[inline]
    pub fn get(&self, role: ArgRole) -> Option<&M> {
        self.memories.get(role)
    }

    #[inline]
    pub fn counters(&self) -> BindingCounters {
        self.counters
    }

    #[inline]
    pub(crate) fn record_execution(&mut self) {
        self.counters.executions += 1;
    }

    /// Bound roles in a stable order.
    pub fn roles(&self) -> Vec<ArgRole> {
        let mut roles: Vec<ArgRole> = self.memories.map.keys().copied().collect();
        roles.sort_unstable();
        roles
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Drop every memory object. Counters are kept.
    pub fn clear(&mut self) {
        self.memories.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, MemoryDesc};

    #[derive(Debug)]
    struct FakeMemory {
        desc: MemoryDesc,
        handle: DataHandle,
    }

    impl MemoryObject for FakeMemory {
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

    fn fake(_: ArgRole, handle: DataHandle) -> Result<FakeMemory, PlanError> {
        Ok(FakeMemory {
            desc: MemoryDesc::row_major(&[1], DataType::F32),
            handle,
        })
    }

    fn handle(addr: usize) -> DataHandle {
        DataHandle::from_mut(addr as *mut u8)
    }

    #[test]
    fn failed_stage_leaves_table_untouched() {
        let mut bindings = ArgBindings::<FakeMemory>::default();
        let staged = bindings.stage(&[(ArgRole::SRC, handle(0x10))], BindingMode::CarryForward, fake).unwrap();
        bindings.commit(staged);

        let result = bindings.stage(
            &[(ArgRole::SRC, handle(0x20)), (ArgRole::DST, handle(0x30))],
            BindingMode::CarryForward,
            |role, _| Err(PlanError::UnsupportedArgument(role)),
        );
        assert_eq!(result.err(), Some(PlanError::UnsupportedArgument(ArgRole::DST)));
        assert_eq!(bindings.get(ArgRole::SRC).unwrap().data_handle(), handle(0x10));
        assert_eq!(bindings.roles(), vec![ArgRole::SRC]);
    }

    #[test]
    fn duplicate_role_creates_once_and_last_wins() {
        let mut bindings = ArgBindings::<FakeMemory>::default();
        let mut created = 0;
        let staged = bindings
            .stage(
                &[(ArgRole::DST, handle(0x10)), (ArgRole::DST, handle(0x20))],
                BindingMode::CarryForward,
                |role, h| {
                    created += 1;
                    fake(role, h)
                },
            )
            .unwrap();
        bindings.commit(staged);

        assert_eq!(created, 1);
        assert_eq!(bindings.get(ArgRole::DST).unwrap().data_handle(), handle(0x20));
        assert_eq!(bindings.counters().memory_created, 1);
    }

    #[test]
    fn strict_mode_reports_omitted_role() {
        let mut bindings = ArgBindings::<FakeMemory>::default();
        let staged = bindings
            .stage(&[(ArgRole::SRC, handle(0x10)), (ArgRole::DST, handle(0x20))], BindingMode::Strict, fake)
            .unwrap();
        bindings.commit(staged);

        let result = bindings.stage(&[(ArgRole::SRC, handle(0x30))], BindingMode::Strict, fake);
        assert_eq!(result.err(), Some(PlanError::StaleBinding(ArgRole::DST)));

        let carried = bindings.stage(&[(ArgRole::SRC, handle(0x30))], BindingMode::CarryForward, fake);
        assert!(carried.is_ok());
    }

    #[test]
    fn strict_mode_reports_the_lowest_omitted_role() {
        let mut bindings = ArgBindings::<FakeMemory>::default();
        let all = [
            (ArgRole::SRC, handle(0x10)),
            (ArgRole::WEIGHTS, handle(0x20)),
            (ArgRole::DST, handle(0x30)),
            (ArgRole::Scratchpad, handle(0x40)),
        ];
        let staged = bindings.stage(&all, BindingMode::Strict, fake).unwrap();
        assert_eq!(bindings.commit(staged).as_slice(), &[ArgRole::SRC, ArgRole::WEIGHTS, ArgRole::DST, ArgRole::Scratchpad]);

        for _ in 0..8 {
            let result = bindings.stage(&[(ArgRole::SRC, handle(0x50))], BindingMode::Strict, fake);
            assert_eq!(result.err(), Some(PlanError::StaleBinding(ArgRole::WEIGHTS)));
        }

        let staged = bindings.stage(&all, BindingMode::Strict, fake).unwrap();
        assert!(bindings.commit(staged).is_empty());
    }
}
