//! Cache construction settings read from the process environment.

use primcache_env::{CACHE_CAPACITY, CACHE_EVICTION, EnvVarError, STRICT_BINDINGS};

use super::eviction::{DEFAULT_CAPACITY, EvictionPolicy, EvictionStrategy};
use crate::bindings::BindingMode;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Env(#[from] EnvVarError),
    #[error("{0}")]
    Strategy(String),
}

/// Everything needed to construct a [`PlanCache`](super::PlanCache).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheSettings {
    pub policy: EvictionPolicy,
    pub binding_mode: BindingMode,
}

impl CacheSettings {
    /// Read `PRIMCACHE_CAPACITY`, `PRIMCACHE_EVICTION` and `PRIMCACHE_STRICT_BINDINGS`.
    ///
    /// Unset variables take their defaults; malformed ones are errors.
    pub fn from_env() -> Result<Self, SettingsError> {
        let capacity = CACHE_CAPACITY.get_or(DEFAULT_CAPACITY)?;
        let strategy = match CACHE_EVICTION.get()? {
            Some(raw) => raw.parse::<EvictionStrategy>().map_err(SettingsError::Strategy)?,
            None => EvictionStrategy::default(),
        };
        let binding_mode = if STRICT_BINDINGS.get_or(false)? {
            BindingMode::Strict
        } else {
            BindingMode::CarryForward
        };

        Ok(Self {
            policy: EvictionPolicy { strategy, capacity },
            binding_mode,
        })
    }
}
