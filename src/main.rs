use anyhow::Result;
use clap::Parser;
use primcache_cli::cli::CliConfig;
use primcache_cli::cli::config::OutputFormat;
use primcache_cli::workload::run_workload;
use primcache_instrumentation::config::AppConfig;
use primcache_instrumentation::logging::init_tracing;

fn main() -> Result<()> {
    let cli = CliConfig::parse();

    let mut app_config = AppConfig::from_env()?;
    if let Some(level) = cli.log_level_override() {
        app_config.log_level = level;
    }
    let app_config = AppConfig::initialise(app_config)?;
    init_tracing(app_config)?;

    let workload = cli.workload(cli.cache_settings()?)?;
    let report = run_workload(&workload)?;

    match cli.output_format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
