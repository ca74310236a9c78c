//! Scoped overrides that put the previous environment state back on drop.

use super::{EnvVar, Environment};

/// Restores a single variable to whatever it held before the guard was created.
///
/// Intended for tests: combine with `#[serial]` so concurrently running tests
/// never observe each other's overrides.
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct EnvVarGuard {
    var: EnvVar,
    previous: Option<String>,
}

impl EnvVarGuard {
    /// Override `var` with a raw string value until the guard drops.
    pub fn set(var: impl Into<EnvVar>, value: &str) -> Self {
        let var = var.into();
        let mut lock = Environment::lock();
        let previous = Environment::get(var);
        Environment::set_locked(var, value, &mut lock);
        Self { var, previous }
    }

    /// Remove `var` until the guard drops.
    pub fn unset(var: impl Into<EnvVar>) -> Self {
        let var = var.into();
        let mut lock = Environment::lock();
        let previous = Environment::get(var);
        Environment::remove_locked(var, &mut lock);
        Self { var, previous }
    }

    /// The variable this guard restores.
    pub fn var(&self) -> EnvVar {
        self.var
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        let mut lock = Environment::lock();
        match &self.previous {
            Some(previous) => Environment::set_locked(self.var, previous, &mut lock),
            None => Environment::remove_locked(self.var, &mut lock),
        }
    }
}
