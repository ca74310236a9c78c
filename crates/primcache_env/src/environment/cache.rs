//! Plan cache sizing and binding variables.

use std::num::NonZeroUsize;

use super::EnvVar;
use super::value::{EnvValueError, TypedEnvVar, format_display, parse_bool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEnvVar {
    /// Maximum number of compiled plans held by one thread's cache.
    Capacity,
    /// Victim selection once the cache is full: `lru` or `fifo`.
    Eviction,
    /// Require every bound argument to be re-supplied on each execute.
    StrictBindings,
}

impl CacheEnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            CacheEnvVar::Capacity => "PRIMCACHE_CAPACITY",
            CacheEnvVar::Eviction => "PRIMCACHE_EVICTION",
            CacheEnvVar::StrictBindings => "PRIMCACHE_STRICT_BINDINGS",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Cache(self)
    }
}

pub const CACHE_CAPACITY: TypedEnvVar<NonZeroUsize> =
    TypedEnvVar::new(CacheEnvVar::Capacity.into_env(), parse_capacity, format_display);

/// Normalised to lowercase; only `lru` and `fifo` are accepted.
pub const CACHE_EVICTION: TypedEnvVar<String> = TypedEnvVar::new(CacheEnvVar::Eviction.into_env(), parse_eviction, format_display);

pub const STRICT_BINDINGS: TypedEnvVar<bool> = TypedEnvVar::new(CacheEnvVar::StrictBindings.into_env(), parse_bool, format_display);

fn parse_capacity(value: &str) -> Result<NonZeroUsize, EnvValueError> {
    value
        .parse::<NonZeroUsize>()
        .map_err(|_| EnvValueError::new("capacity must be a positive integer"))
}

fn parse_eviction(value: &str) -> Result<String, EnvValueError> {
    let lowered = value.to_ascii_lowercase();
    match lowered.as_str() {
        "lru" | "fifo" => Ok(lowered),
        _ => Err(EnvValueError::new("expected one of: lru, fifo")),
    }
}
