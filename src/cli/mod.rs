//! Command-line parsing for the plan-cache workload runner.

pub mod config;
pub mod error;

pub use config::CliConfig;
pub use error::CliError;
