use primcache::caching::SettingsError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Error when parsing command line arguments
    #[error("Failed to parse command line arguments: {0}")]
    ArgParseError(#[from] clap::Error),

    /// Cache environment variables could not be read
    #[error("Cache settings error: {0}")]
    SettingsError(#[from] SettingsError),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CliError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
