//! tensorscan command-line sampler.
//!
//! Resolves the effective configuration (CLI > config file > defaults),
//! installs logging and dispatches to the subcommand implementations.

mod cli;
mod commands;

use clap::Parser;
use std::path::PathBuf;

use tensorscan::config::{load_config_file, locate_config, validate_effective_config, Config};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};

use cli::{Args, Commands, ConfigFormat, LogLevel, SampleArgs};

/// Merges config file and CLI overrides. Also returns the file that was
/// read, if any, so it can be logged once logging is up.
fn resolve_config(args: &Args) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let source = if args.no_config {
        None
    } else {
        locate_config(args.config.as_deref())
    };
    let mut config = match &source {
        Some(path) => load_config_file(path)?,
        None => Config::default(),
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(fixture) = &args.fixture {
        config.fixture_file = Some(fixture.clone());
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }

    if let Some(Commands::Sample(sample)) = &args.command {
        apply_sample_args(&mut config, sample);
    }

    Ok((config, source))
}

fn apply_sample_args(config: &mut Config, sample: &SampleArgs) {
    if sample.mode.is_some() {
        config.mode = sample.mode;
    }
    if sample.capacity.is_some() {
        config.capacity = sample.capacity;
    }
    if sample.interval_ms.is_some() {
        config.interval_ms = sample.interval_ms;
    }
    if sample.iterations.is_some() {
        config.iterations = sample.iterations;
    }
    if sample.pid_min.is_some() {
        config.pid_min = sample.pid_min;
    }
    if sample.pid_max.is_some() {
        config.pid_max = sample.pid_max;
    }
    if sample.uid.is_some() {
        config.uid = sample.uid;
    }
    if sample.whitelist.is_some() {
        config.pid_whitelist = sample.whitelist.clone();
    }
    if sample.columns.is_some() {
        config.columns = sample.columns.clone();
    }
    if sample.session_row_limit.is_some() {
        config.session_row_limit = sample.session_row_limit;
    }
}

/// Shows configuration in requested format
fn show_config(config: &Config, format: ConfigFormat) -> anyhow::Result<()> {
    let output = commands::config::render_config(config, format)?;
    println!("{output}");
    Ok(())
}

fn setup_logging(config: &Config) {
    let level = config
        .log_level
        .as_deref()
        .and_then(LogLevel::from_name)
        .unwrap_or(LogLevel::Info);
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    // Table output goes to stdout; logs stay on stderr.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {:?}", level);
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let (config, source) = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        return show_config(&config, args.config_format);
    }

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config);
    match &source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No configuration file, using defaults"),
    }

    match args.command {
        Some(Commands::Sample(sample)) => {
            info!("Starting tensorscan sampler");
            commands::command_sample(&config, sample.comm)
        }
        None => {
            info!("Starting tensorscan sampler");
            commands::command_sample(&config, false)
        }
        Some(Commands::Check) => commands::command_check(&config),
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => commands::command_config(output, format, commented),
        Some(Commands::Metrics) => commands::command_metrics(),
        Some(Commands::GenerateTestdata {
            output,
            count,
            first_pid,
        }) => commands::command_generate_testdata(output, count, first_pid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorscan::config::SampleMode;

    #[test]
    fn test_cli_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tensorscan.yaml");
        std::fs::write(&path, "mode: absolute\ncapacity: 8\nuid: 5\n").unwrap();

        let args = Args::parse_from([
            "tensorscan",
            "--config",
            path.to_str().unwrap(),
            "sample",
            "--mode",
            "delta",
            "--capacity",
            "64",
        ]);
        let (config, source) = resolve_config(&args).unwrap();
        assert_eq!(source.as_deref(), Some(path.as_path()));
        assert_eq!(config.mode(), SampleMode::Delta);
        assert_eq!(config.capacity(), 64);
        assert_eq!(config.uid, Some(5));
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let args = Args::parse_from(["tensorscan", "--no-config", "--log-level", "trace", "check"]);
        let (config, source) = resolve_config(&args).unwrap();
        assert!(source.is_none());
        assert_eq!(config.capacity(), Config::default().capacity());
        assert_eq!(config.log_level.as_deref(), Some("trace"));
    }
}
