//! Element types, tensor/memory descriptors and raw data handles.

pub mod desc;
pub mod dtype;
pub mod handle;

pub use desc::{MemoryDesc, TensorDesc};
pub use dtype::{DataType, Layout};
pub use handle::{DataHandle, MemoryKind};
