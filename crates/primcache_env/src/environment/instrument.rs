//! Logging and metrics export variables.

use std::path::PathBuf;

use tracing::Level;

use super::EnvVar;
use super::value::{EnvValueError, TypedEnvVar, format_display, parse_bool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentEnvVar {
    /// Minimum level for the `fmt` log output.
    LogLevel,
    /// Echo metric events to stdout.
    MetricsConsole,
    /// Append metric events to this file as JSON lines.
    MetricsJsonlPath,
}

impl InstrumentEnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            InstrumentEnvVar::LogLevel => "PRIMCACHE_LOG_LEVEL",
            InstrumentEnvVar::MetricsConsole => "PRIMCACHE_METRICS_CONSOLE",
            InstrumentEnvVar::MetricsJsonlPath => "PRIMCACHE_METRICS_JSONL_PATH",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Instrument(self)
    }
}

pub const LOG_LEVEL: TypedEnvVar<Level> = TypedEnvVar::new(InstrumentEnvVar::LogLevel.into_env(), parse_log_level, format_display);

pub const METRICS_CONSOLE: TypedEnvVar<bool> = TypedEnvVar::new(InstrumentEnvVar::MetricsConsole.into_env(), parse_bool, format_display);

pub const METRICS_JSONL_PATH: TypedEnvVar<PathBuf> =
    TypedEnvVar::new(InstrumentEnvVar::MetricsJsonlPath.into_env(), parse_path, format_path);

fn parse_log_level(value: &str) -> Result<Level, EnvValueError> {
    value.parse::<Level>().map_err(|_| EnvValueError::new("invalid tracing level"))
}

fn parse_path(value: &str) -> Result<PathBuf, EnvValueError> {
    if value.is_empty() {
        return Err(EnvValueError::new("path must not be empty"));
    }
    Ok(PathBuf::from(value))
}

fn format_path(path: &PathBuf) -> Result<String, EnvValueError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| EnvValueError::new("path is not valid UTF-8"))
}
