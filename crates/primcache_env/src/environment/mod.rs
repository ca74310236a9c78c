//! Namespaced environment variables and the synchronised process-environment facade.

pub mod cache;
pub mod guard;
pub mod instrument;
pub mod value;

use std::sync::{Mutex, MutexGuard, OnceLock};

use cache::CacheEnvVar;
use instrument::InstrumentEnvVar;

/// Every environment variable understood by primcache, grouped by owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvVar {
    /// Logging and metrics export.
    Instrument(InstrumentEnvVar),
    /// Plan cache sizing and binding behaviour.
    Cache(CacheEnvVar),
}

impl From<InstrumentEnvVar> for EnvVar {
    fn from(value: InstrumentEnvVar) -> Self {
        Self::Instrument(value)
    }
}

impl From<CacheEnvVar> for EnvVar {
    fn from(value: CacheEnvVar) -> Self {
        Self::Cache(value)
    }
}

impl EnvVar {
    /// The literal variable name looked up in the process environment.
    pub const fn key(self) -> &'static str {
        match self {
            EnvVar::Instrument(inner) => inner.key(),
            EnvVar::Cache(inner) => inner.key(),
        }
    }
}

/// Returns true when the variable is present and not an explicit "off" value.
pub fn is_set(var: impl Into<EnvVar>) -> bool {
    match Environment::get(var) {
        Some(raw) => !matches!(raw.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off"),
        None => false,
    }
}

/// Serialised access to the process environment.
///
/// Mutating the environment while another thread reads it is undefined
/// behaviour, so every write goes through a single process-wide mutex.
pub struct Environment;

impl Environment {
    /// Acquire the environment mutex. Hold the guard to batch several mutations.
    pub fn lock() -> MutexGuard<'static, ()> {
        static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the variable as UTF-8, if present.
    pub fn get(var: impl Into<EnvVar>) -> Option<String> {
        std::env::var(var.into().key()).ok()
    }

    /// Set the variable, taking the environment lock for the duration of the write.
    pub fn set(var: impl Into<EnvVar>, value: &str) {
        let var = var.into();
        let mut guard = Self::lock();
        Self::set_locked(var, value, &mut guard);
    }

    /// Remove the variable, taking the environment lock for the duration of the write.
    pub fn remove(var: impl Into<EnvVar>) {
        let var = var.into();
        let mut guard = Self::lock();
        Self::remove_locked(var, &mut guard);
    }

    pub(crate) fn set_locked(var: EnvVar, value: &str, _guard: &mut MutexGuard<'static, ()>) {
        // SAFETY: the guard proves the environment mutex is held, so no other
        // primcache writer can race this mutation.
        unsafe { std::env::set_var(var.key(), value) };
    }

    pub(crate) fn remove_locked(var: EnvVar, _guard: &mut MutexGuard<'static, ()>) {
        // SAFETY: see `set_locked`.
        unsafe { std::env::remove_var(var.key()) };
    }
}
