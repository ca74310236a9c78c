use std::num::NonZeroUsize;

use primcache::caching::EvictionPolicy;

use super::*;

fn config() -> CliConfig {
    CliConfig {
        capacity: None,
        eviction: None,
        working_set: 8,
        iterations: 100,
        hidden: 64,
        variant: VariantChoice::Plain,
        verbose: 0,
        output_format: OutputFormat::Text,
    }
}

#[test]
fn test_cli_config_parses_arguments() {
    let parsed = CliConfig::try_parse_from([
        "primcache_cli",
        "--capacity",
        "4",
        "--eviction",
        "fifo",
        "--variant",
        "resadd",
        "--output-format",
        "json",
        "-vv",
    ])
    .expect("valid arguments");

    assert_eq!(parsed.capacity, NonZeroUsize::new(4));
    assert_eq!(parsed.eviction, Some(EvictionChoice::Fifo));
    assert_eq!(parsed.variant, VariantChoice::Resadd);
    assert_eq!(parsed.output_format, OutputFormat::Json);
    assert_eq!(parsed.log_level_override(), Some(Level::TRACE));
    assert_eq!(parsed.working_set, 8);
}

#[test]
fn test_cli_config_rejects_zero_capacity() {
    assert!(CliConfig::try_parse_from(["primcache_cli", "--capacity", "0"]).is_err());
}

#[test]
fn test_cli_config_overrides_cache_settings() {
    let mut cli = config();
    cli.capacity = NonZeroUsize::new(2);
    cli.eviction = Some(EvictionChoice::Fifo);

    let mut settings = CacheSettings::default();
    cli.apply_overrides(&mut settings);
    assert_eq!(settings.policy, EvictionPolicy::fifo(NonZeroUsize::new(2).unwrap()));

    let untouched = config();
    let mut defaults = CacheSettings::default();
    untouched.apply_overrides(&mut defaults);
    assert_eq!(defaults, CacheSettings::default());
}

#[test]
fn test_cli_config_validates_workload() {
    let mut cli = config();
    cli.working_set = 0;
    assert!(matches!(cli.workload(CacheSettings::default()), Err(CliError::ConfigError(_))));

    let mut cli = config();
    cli.hidden = 0;
    assert!(matches!(cli.workload(CacheSettings::default()), Err(CliError::ConfigError(_))));

    let workload = config().workload(CacheSettings::default()).expect("valid workload");
    assert_eq!(workload.variant, OpVariant::Plain);
    assert_eq!(workload.working_set, 8);
}
