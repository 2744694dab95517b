//! CLI arguments and subcommands for tensorscan.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tensorscan::config::SampleMode;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses a config-file level name.
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "tensorscan",
    about = "Per-process resource sampler emitting fixed-width numeric matrices",
    long_about = "Per-process resource sampler emitting fixed-width numeric matrices.\n\n\
                  Samples CPU time, memory, threads, context switches, scheduling core, \
                  I/O counters and identity fields for every process, either as absolute \
                  values or as per-interval deltas that survive pid reuse.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides config log_level)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Alternative procfs mount point
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Path to JSON fixture file (samples synthetic data instead of /proc)
    #[arg(short = 't', long)]
    pub fixture: Option<PathBuf>,
}

/// Selection and output options shared by sampling runs
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SampleArgs {
    /// Snapshot mode
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<SampleMode>,

    /// Rows per snapshot buffer
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Pause between iterations in milliseconds
    #[arg(short = 'i', long)]
    pub interval_ms: Option<u64>,

    /// Number of snapshots to take
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Lowest pid to include
    #[arg(long)]
    pub pid_min: Option<u32>,

    /// Highest pid to include
    #[arg(long)]
    pub pid_max: Option<u32>,

    /// Only processes owned by this uid
    #[arg(long)]
    pub uid: Option<u32>,

    /// Only these pids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub whitelist: Option<Vec<u32>>,

    /// Columns to print (comma-separated names or aliases)
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,

    /// Upper bound on delta session buffer growth
    #[arg(long)]
    pub session_row_limit: Option<usize>,

    /// Print command names next to pids
    #[arg(long)]
    pub comm: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Take one or more snapshots and print them as a table
    Sample(SampleArgs),

    /// Validate configuration and system requirements
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// List matrix columns with their index, kind and alias
    Metrics,

    /// Generate synthetic fixture JSON file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "testdata.json")]
        output: PathBuf,

        /// Number of processes to generate
        #[arg(long, default_value_t = 32)]
        count: usize,

        /// First pid to assign
        #[arg(long, default_value_t = 1000)]
        first_pid: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_args_parse() {
        let args = Args::parse_from([
            "tensorscan",
            "--log-level",
            "debug",
            "sample",
            "--mode",
            "delta",
            "--whitelist",
            "1,2,3",
            "--columns",
            "utime,rss",
            "-n",
            "3",
        ]);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        match args.command {
            Some(Commands::Sample(s)) => {
                assert_eq!(s.mode, Some(SampleMode::Delta));
                assert_eq!(s.whitelist, Some(vec![1, 2, 3]));
                assert_eq!(s.columns, Some(vec!["utime".to_string(), "rss".to_string()]));
                assert_eq!(s.iterations, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_log_level_from_name() {
        assert_eq!(LogLevel::from_name("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_name("loud"), None);
    }
}
