use thiserror::Error;

use crate::args::{ArgRole, Query};
use crate::types::DataType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("query {0:?} does not name a memory descriptor")]
    InvalidQuery(Query),
    #[error("plan has no argument for role {0}")]
    UnsupportedArgument(ArgRole),
    #[error("role {0} is bound but was not supplied to this call")]
    StaleBinding(ArgRole),
    #[error("required argument {0} is not bound")]
    MissingArgument(ArgRole),
    #[error("argument {0} is bound to a null handle")]
    NullHandle(ArgRole),
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
    #[error("Unsupported dtype {dtype} for {operation}")]
    UnsupportedDtype { operation: &'static str, dtype: DataType },
    #[error("Unsupported post-op: {0}")]
    UnsupportedPostOp(String),
    #[error("buffer for {role} holds {actual} bytes but the plan needs {expected}")]
    BufferTooSmall { role: ArgRole, expected: usize, actual: usize },
    #[error("Configuration failed: {0}")]
    Configuration(String),
    #[error("Backend failure: {0}")]
    Backend(String),
}
