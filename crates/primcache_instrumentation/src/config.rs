//! Instrumentation configuration loaded from the process environment.

use std::path::PathBuf;
use std::sync::OnceLock;

use primcache_env::{EnvVarError, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH};
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("app configuration already initialised")]
    AlreadyInitialised,
    #[error("invalid log level '{value}'")]
    InvalidLogLevel { value: String },
    #[error("invalid boolean flag '{value}' for {name}")]
    InvalidBoolean { name: &'static str, value: String },
    #[error("failed to access instrumentation environment: {source}")]
    EnvVar {
        #[from]
        source: EnvVarError,
    },
}

/// Logging and metrics settings shared by the binaries and benches.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: Level,
    pub enable_console_metrics: bool,
    pub metrics_jsonl_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            enable_console_metrics: false,
            metrics_jsonl_path: None,
        }
    }
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

impl AppConfig {
    /// Read `PRIMCACHE_LOG_LEVEL`, `PRIMCACHE_METRICS_CONSOLE` and `PRIMCACHE_METRICS_JSONL_PATH`.
    pub fn from_env() -> Result<Self, AppConfigError> {
        let log_level = match LOG_LEVEL.get() {
            Ok(value) => value.unwrap_or(Level::INFO),
            Err(EnvVarError::Parse { value, .. }) => return Err(AppConfigError::InvalidLogLevel { value }),
            Err(err) => return Err(err.into()),
        };

        let enable_console_metrics = match METRICS_CONSOLE.get() {
            Ok(value) => value.unwrap_or(false),
            Err(EnvVarError::Parse { value, .. }) => {
                return Err(AppConfigError::InvalidBoolean {
                    name: METRICS_CONSOLE.key(),
                    value,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let metrics_jsonl_path = METRICS_JSONL_PATH.get()?;

        Ok(Self {
            log_level,
            enable_console_metrics,
            metrics_jsonl_path,
        })
    }

    /// Store `config` as the process-wide configuration. Fails if one is already set.
    pub fn initialise(config: AppConfig) -> Result<&'static Self, AppConfigError> {
        APP_CONFIG.set(config).map_err(|_| AppConfigError::AlreadyInitialised)?;
        APP_CONFIG.get().ok_or(AppConfigError::AlreadyInitialised)
    }

    /// The process-wide configuration, loading it from the environment on first use.
    pub fn get_or_init_from_env() -> Result<&'static Self, AppConfigError> {
        if let Some(existing) = APP_CONFIG.get() {
            return Ok(existing);
        }
        let config = Self::from_env()?;
        Ok(APP_CONFIG.get_or_init(|| config))
    }

    pub fn try_global() -> Option<&'static Self> {
        APP_CONFIG.get()
    }
}
