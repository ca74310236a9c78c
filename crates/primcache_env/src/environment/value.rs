//! Strongly typed environment variable descriptors.
//!
//! A [`TypedEnvVar`] pairs an [`EnvVar`] with a parse and a format callback so
//! that callers never handle raw strings. Invalid values surface as
//! [`EnvVarError::Parse`] instead of silently falling back to a default.
//!
//! ```
//! use primcache_env::CACHE_CAPACITY;
//! use std::num::NonZeroUsize;
//!
//! let guard = CACHE_CAPACITY.set_guard(NonZeroUsize::new(64).unwrap()).unwrap();
//! assert_eq!(CACHE_CAPACITY.get().unwrap(), Some(*guard));
//! ```

use std::{marker::PhantomData, ops::Deref};

use super::{EnvVar, Environment, guard::EnvVarGuard};

/// Failure raised by a parse or format callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EnvValueError(String);

impl EnvValueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&'static str> for EnvValueError {
    fn from(value: &'static str) -> Self {
        Self(value.to_string())
    }
}

/// Errors emitted when reading or writing a typed environment variable.
#[derive(Debug, thiserror::Error)]
pub enum EnvVarError {
    #[error("failed to parse environment variable {name} from '{value}': {source}")]
    Parse {
        name: &'static str,
        value: String,
        source: EnvValueError,
    },
    #[error("failed to format environment variable {name}: {source}")]
    Format { name: &'static str, source: EnvValueError },
}

pub type ParseFn<T> = fn(&str) -> Result<T, EnvValueError>;
pub type FormatFn<T> = fn(&T) -> Result<String, EnvValueError>;

/// Descriptor for an environment variable holding a value of type `T`.
#[derive(Clone, Copy)]
pub struct TypedEnvVar<T> {
    var: EnvVar,
    parse: ParseFn<T>,
    format: FormatFn<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedEnvVar<T> {
    pub const fn new(var: EnvVar, parse: ParseFn<T>, format: FormatFn<T>) -> Self {
        Self {
            var,
            parse,
            format,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.var.key()
    }

    #[must_use]
    pub const fn var(&self) -> EnvVar {
        self.var
    }

    fn format_value(&self, value: &T) -> Result<String, EnvVarError> {
        (self.format)(value).map_err(|source| EnvVarError::Format { name: self.key(), source })
    }

    /// Read and parse the variable. `Ok(None)` means it is not set.
    pub fn get(&self) -> Result<Option<T>, EnvVarError> {
        let Some(raw) = Environment::get(self.var) else {
            return Ok(None);
        };
        (self.parse)(raw.trim()).map(Some).map_err(|source| EnvVarError::Parse {
            name: self.key(),
            value: raw,
            source,
        })
    }

    /// Read the variable, falling back to `default` only when it is unset.
    pub fn get_or(&self, default: T) -> Result<T, EnvVarError> {
        Ok(self.get()?.unwrap_or(default))
    }

    pub fn set(&self, value: T) -> Result<(), EnvVarError> {
        let formatted = self.format_value(&value)?;
        Environment::set(self.var, &formatted);
        Ok(())
    }

    pub fn unset(&self) {
        Environment::remove(self.var);
    }

    /// Set the variable until the returned guard drops.
    pub fn set_guard(&self, value: T) -> Result<TypedEnvVarGuard<T>, EnvVarError> {
        let formatted = self.format_value(&value)?;
        Ok(TypedEnvVarGuard {
            _restore: EnvVarGuard::set(self.var, &formatted),
            value,
        })
    }

    /// Remove the variable until the returned guard drops.
    pub fn unset_guard(&self) -> EnvVarGuard {
        EnvVarGuard::unset(self.var)
    }
}

/// Scoped override produced by [`TypedEnvVar::set_guard`]; derefs to the value that was set.
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct TypedEnvVarGuard<T> {
    _restore: EnvVarGuard,
    value: T,
}

impl<T> Deref for TypedEnvVarGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, EnvValueError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvValueError::new("value is not a recognised boolean")),
    }
}

pub(crate) fn format_display<T: std::fmt::Display>(value: &T) -> Result<String, EnvValueError> {
    Ok(value.to_string())
}
