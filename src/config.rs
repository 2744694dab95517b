//! Configuration file model for the sampling CLI.
//!
//! Every field is optional so that a partial file (or none at all) merges
//! cleanly with CLI overrides and the built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::schema::{Metric, METRIC_COUNT};

pub const DEFAULT_CAPACITY: usize = 4096;
/// Largest accepted snapshot buffer, in rows.
pub const MAX_CAPACITY: usize = 1 << 22;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_ITERATIONS: usize = 1;
pub const DEFAULT_CONFIG_FILE: &str = "tensorscan.yaml";

const DEFAULT_LOCATIONS: [&str; 6] = [
    "/etc/tensorscan/tensorscan.yaml",
    "/etc/tensorscan/tensorscan.yml",
    "/etc/tensorscan/tensorscan.json",
    "./tensorscan.yaml",
    "./tensorscan.yml",
    "./tensorscan.json",
];

/// Snapshot flavour used by the `sample` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    Absolute,
    Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Data source
    pub proc_root: Option<PathBuf>,
    pub fixture_file: Option<PathBuf>,

    // Sampling
    pub mode: Option<SampleMode>,
    pub capacity: Option<usize>,
    pub interval_ms: Option<u64>,
    pub iterations: Option<usize>,
    pub session_row_limit: Option<usize>,

    // Filtering
    pub pid_min: Option<u32>,
    pub pid_max: Option<u32>,
    pub uid: Option<u32>,
    #[serde(alias = "whitelist")]
    pub pid_whitelist: Option<Vec<u32>>,

    // Output
    pub columns: Option<Vec<String>>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: None,
            fixture_file: None,
            mode: Some(SampleMode::Absolute),
            capacity: Some(DEFAULT_CAPACITY),
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            iterations: Some(DEFAULT_ITERATIONS),
            session_row_limit: None,
            pid_min: None,
            pid_max: None,
            uid: None,
            pid_whitelist: None,
            columns: None,
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn mode(&self) -> SampleMode {
        self.mode.unwrap_or(SampleMode::Absolute)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS)
    }

    pub fn iterations(&self) -> usize {
        self.iterations.unwrap_or(DEFAULT_ITERATIONS)
    }

    /// The filter described by the filtering fields; `None` when none is set.
    pub fn to_filter(&self) -> Option<Filter> {
        let mut filter = Filter::new();
        if let Some(min) = self.pid_min {
            filter = filter.pid_min(min);
        }
        if let Some(max) = self.pid_max {
            filter = filter.pid_max(max);
        }
        if let Some(uid) = self.uid {
            filter = filter.only_uid(uid);
        }
        if let Some(list) = self.pid_whitelist.as_ref().filter(|l| !l.is_empty()) {
            filter = filter.whitelist(list.iter().copied());
        }
        if filter.is_unrestricted() {
            None
        } else {
            Some(filter)
        }
    }

    /// Selected output columns, all of them when unset.
    pub fn selected_metrics(&self) -> anyhow::Result<Vec<Metric>> {
        match &self.columns {
            None => Ok(Metric::ALL.to_vec()),
            Some(names) => names
                .iter()
                .map(|n| {
                    Metric::from_name(n).with_context(|| format!("unknown metric column '{}'", n))
                })
                .collect(),
        }
    }
}

/// Checks cross-field constraints of the merged configuration.
pub fn validate_effective_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.capacity() == 0 {
        bail!("capacity must be at least 1");
    }
    if cfg.capacity() > MAX_CAPACITY || cfg.capacity().checked_mul(METRIC_COUNT).is_none() {
        bail!("capacity {} exceeds the maximum of {}", cfg.capacity(), MAX_CAPACITY);
    }

    if cfg.iterations() > 1 && cfg.interval_ms() == 0 {
        bail!("interval_ms must be at least 1 when iterations > 1");
    }

    if let (Some(min), Some(max)) = (cfg.pid_min, cfg.pid_max) {
        if min > max {
            bail!("pid_min ({}) is greater than pid_max ({})", min, max);
        }
    }

    if cfg.session_row_limit == Some(0) {
        bail!("session_row_limit must be at least 1 when set");
    }

    cfg.selected_metrics()?;

    if let Some(level) = cfg.log_level.as_deref() {
        if !matches!(level, "off" | "error" | "warn" | "info" | "debug" | "trace") {
            bail!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                level
            );
        }
    }

    Ok(())
}

/// The file `load_config` would read: `path` when given, otherwise the first
/// default location that exists.
pub fn locate_config(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(p) => Some(p.to_path_buf()),
        None => DEFAULT_LOCATIONS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf),
    }
}

/// Parses one configuration file; the format follows the extension (YAML
/// when unknown).
pub fn load_config_file(path: &Path) -> anyhow::Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
    };
    Ok(config)
}

/// Loads a configuration file, or the first one found in the default
/// locations. No file at all yields the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match locate_config(path) {
        Some(p) => load_config_file(&p),
        None => Ok(Config::default()),
    }
}

/// Prepends the annotated field reference to a generated YAML config.
pub fn add_config_comments(yaml: String) -> String {
    let comments = r#"# tensorscan Configuration
# ========================
#
# Data Source
# -----------
# proc_root: null              # Alternative procfs mount (null = /proc)
# fixture_file: null           # Sample a generated JSON process table instead
#
# Sampling
# --------
# mode: absolute               # absolute or delta
# capacity: 4096               # Rows per snapshot buffer
# interval_ms: 1000            # Pause between iterations
# iterations: 1                # Number of snapshots to take
# session_row_limit: null      # Cap on delta session buffer growth
#
# Filtering
# ---------
# pid_min: null                # Lowest pid to include
# pid_max: null                # Highest pid to include
# uid: null                    # Only processes owned by this uid
# pid_whitelist: null          # Only these pids (e.g. [1, 42])
#
# Output
# ------
# columns: null                # Columns to print (null = all), e.g. ["utime", "rss"]
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
