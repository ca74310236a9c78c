//! Compiled-plan caching for quantized tensor operations.
//!
//! Building an execution plan is expensive, so [`caching::PlanCache`] builds at
//! most one per [`key::OpKey`] and keeps it behind a [`plan::PlanHandle`]. The
//! handle derives each argument's memory layout the first time the argument is
//! bound and afterwards only swaps the raw data pointer, so repeated calls with
//! the same shapes cost one hash lookup plus the kernel itself.
//!
//! The kernel library is abstracted by [`backend::KernelBackend`]; [`host`]
//! provides a CPU implementation of an int4-weight matmul and [`ops`] the
//! call-site entry points that use the per-thread cache from [`context`].

pub mod args;
pub mod backend;
pub mod bindings;
pub mod caching;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod key;
pub mod ops;
pub mod plan;
pub mod types;
pub mod variant;

pub use args::{ArgRole, MdKind, Operand, Query};
pub use backend::{CompiledPlan, KernelBackend, MemoryObject};
pub use bindings::{ArgBindings, BindingCounters, BindingMode, ExecArgs};
pub use caching::{CacheMetrics, CacheSettings, EvictionPolicy, EvictionStrategy, PlanCache};
pub use config::{Activation, BinaryAlg, PlanConfig, PostOp, ScratchpadMode};
pub use error::PlanError;
pub use key::{Decorations, Granularity, OpKey, QuantParam};
pub use plan::PlanHandle;
pub use types::{DataHandle, DataType, Layout, MemoryDesc, MemoryKind, TensorDesc};
pub use variant::OpVariant;
