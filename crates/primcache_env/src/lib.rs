//! Process environment helpers shared by the primcache crates.
//!
//! Every tunable read from the environment is declared here as a
//! [`TypedEnvVar`] so parsing rules live next to the variable name.

pub mod environment;

pub use environment::cache::{CACHE_CAPACITY, CACHE_EVICTION, CacheEnvVar, STRICT_BINDINGS};
pub use environment::guard::EnvVarGuard;
pub use environment::instrument::{InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH};
pub use environment::value::{EnvValueError, EnvVarError, TypedEnvVar, TypedEnvVarGuard};
pub use environment::{EnvVar, Environment, is_set};
