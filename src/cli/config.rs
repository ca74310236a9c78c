use std::num::NonZeroUsize;

use clap::Parser;
use primcache::caching::{CacheSettings, EvictionStrategy};
use primcache::{Activation, OpVariant};
use tracing::Level;

use super::error::CliError;
use crate::workload::WorkloadConfig;

/// Command-line interface configuration for the plan-cache workload runner
#[derive(Debug, Parser)]
#[command(name = "primcache_cli")]
#[command(about = "Drive the plan cache with a synthetic int4 matmul workload", long_about = None)]
pub struct CliConfig {
    /// Maximum number of cached plans (defaults to PRIMCACHE_CAPACITY or 1024)
    #[arg(long, value_name = "PLANS")]
    pub capacity: Option<NonZeroUsize>,

    /// Eviction strategy (defaults to PRIMCACHE_EVICTION or lru)
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub eviction: Option<EvictionChoice>,

    /// Number of distinct shapes the workload cycles through
    #[arg(long, default_value_t = 8)]
    pub working_set: usize,

    /// Number of matmul calls to issue
    #[arg(long, default_value_t = 1000)]
    pub iterations: usize,

    /// Shared K and N dimension of every matmul
    #[arg(long, default_value_t = 64)]
    pub hidden: usize,

    /// Post-op variant applied to every call
    #[arg(long, value_enum, default_value_t = VariantChoice::Plain)]
    pub variant: VariantChoice,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format (text, json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,
}

/// Output format options
#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// One JSON document
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
pub enum EvictionChoice {
    /// Evict the least recently used plan.
    Lru,
    /// Evict the oldest plan.
    Fifo,
}

/// Matmul entry point exercised by the workload.
#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
pub enum VariantChoice {
    Plain,
    Silu,
    Resadd,
}

impl From<EvictionChoice> for EvictionStrategy {
    fn from(choice: EvictionChoice) -> Self {
        match choice {
            EvictionChoice::Lru => EvictionStrategy::Lru,
            EvictionChoice::Fifo => EvictionStrategy::Fifo,
        }
    }
}

impl From<VariantChoice> for OpVariant {
    fn from(choice: VariantChoice) -> Self {
        match choice {
            VariantChoice::Plain => OpVariant::Plain,
            VariantChoice::Silu => OpVariant::Activation(Activation::Silu),
            VariantChoice::Resadd => OpVariant::ResidualAdd,
        }
    }
}

impl CliConfig {
    /// Log level implied by `-v` flags, if any were given.
    pub fn log_level_override(&self) -> Option<Level> {
        match self.verbose {
            0 => None,
            1 => Some(Level::DEBUG),
            _ => Some(Level::TRACE),
        }
    }

    /// Environment cache settings with the command-line overrides applied.
    pub fn cache_settings(&self) -> Result<CacheSettings, CliError> {
        let mut settings = CacheSettings::from_env()?;
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    fn apply_overrides(&self, settings: &mut CacheSettings) {
        if let Some(capacity) = self.capacity {
            settings.policy.capacity = capacity;
        }
        if let Some(eviction) = self.eviction {
            settings.policy.strategy = eviction.into();
        }
    }

    /// Check the arguments and turn them into a workload description.
    pub fn workload(&self, settings: CacheSettings) -> Result<WorkloadConfig, CliError> {
        if self.working_set == 0 {
            return Err(CliError::config_error("--working-set must be at least 1"));
        }
        if self.hidden == 0 {
            return Err(CliError::config_error("--hidden must be at least 1"));
        }
        Ok(WorkloadConfig {
            settings,
            working_set: self.working_set,
            iterations: self.iterations,
            hidden: self.hidden,
            variant: self.variant.into(),
        })
    }
}

#[cfg(test)]
#[path = "config.test.rs"]
mod tests;
