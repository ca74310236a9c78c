use serial_test::serial;

use crate::prelude::*;

#[test]
#[serial]
fn app_config_reads_environment() {
    let _log_level = LOG_LEVEL.set_guard(Level::DEBUG).expect("log level should set");
    let _jsonl_path = METRICS_JSONL_PATH
        .set_guard("/tmp/primcache_metrics.jsonl".into())
        .expect("metrics path should set");
    let _console = METRICS_CONSOLE.set_guard(true).expect("console flag should set");

    let config = AppConfig::from_env().expect("configuration should parse");
    assert_eq!(config.log_level, Level::DEBUG);
    assert_eq!(
        config.metrics_jsonl_path.as_deref(),
        Some(std::path::Path::new("/tmp/primcache_metrics.jsonl"))
    );
    assert!(config.enable_console_metrics);

    let initialised = AppConfig::initialise(config.clone()).expect("initialise should succeed once");
    assert_eq!(initialised, &config);
    assert!(AppConfig::try_global().is_some());

    match AppConfig::initialise(config) {
        Err(AppConfigError::AlreadyInitialised) => {}
        other => panic!("expected already initialised error, got {other:?}"),
    }
}

#[test]
#[serial]
fn app_config_defaults_when_unset() {
    let _log_level = LOG_LEVEL.unset_guard();
    let _jsonl_path = METRICS_JSONL_PATH.unset_guard();
    let _console = METRICS_CONSOLE.unset_guard();

    let config = AppConfig::from_env().expect("empty environment should parse");
    assert_eq!(config, AppConfig::default());
}

#[test]
#[serial]
fn app_config_rejects_bad_values() {
    let _log_level = EnvVarGuard::set(InstrumentEnvVar::LogLevel, "verbose");
    let _jsonl_path = METRICS_JSONL_PATH.unset_guard();
    let _console = METRICS_CONSOLE.unset_guard();

    match AppConfig::from_env() {
        Err(AppConfigError::InvalidLogLevel { value }) => assert_eq!(value, "verbose"),
        other => panic!("expected invalid log level error, got {other:?}"),
    }

    let _log_level = LOG_LEVEL.unset_guard();
    let _console = EnvVarGuard::set(InstrumentEnvVar::MetricsConsole, "maybe");

    match AppConfig::from_env() {
        Err(AppConfigError::InvalidBoolean { name, value }) => {
            assert_eq!(name, InstrumentEnvVar::MetricsConsole.key());
            assert_eq!(value, "maybe");
        }
        other => panic!("expected invalid boolean error, got {other:?}"),
    }
}
