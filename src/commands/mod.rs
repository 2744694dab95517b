//! CLI command implementations for tensorscan.
//!
//! This module provides implementations for all CLI subcommands:
//! - `sample`: Snapshot sampling to a table
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `metrics`: Column listing
//! - `generate`: Fixture data generation

pub mod check;
pub mod config;
pub mod generate;
pub mod metrics;
pub mod sample;

use anyhow::Context;
use tensorscan::config::Config;
use tensorscan::{FixtureDriver, PlatformDriver};
use tracing::info;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use metrics::command_metrics;
pub use sample::command_sample;

/// Picks the data source: a fixture file when configured, procfs otherwise.
pub fn build_driver(config: &Config) -> anyhow::Result<Box<dyn PlatformDriver>> {
    if let Some(path) = &config.fixture_file {
        let driver = FixtureDriver::load_from_file(path)
            .with_context(|| format!("failed to load fixture file {}", path.display()))?;
        info!("Sampling fixture data from {}", path.display());
        return Ok(Box::new(driver));
    }
    procfs_driver(config)
}

#[cfg(target_os = "linux")]
fn procfs_driver(config: &Config) -> anyhow::Result<Box<dyn PlatformDriver>> {
    use tensorscan::driver::linux::PROC_ROOT;
    use tensorscan::{system, LinuxDriver};

    let driver = match &config.proc_root {
        Some(root) => LinuxDriver::with_root(root.clone(), system::host_constants()),
        None => LinuxDriver::with_root(PROC_ROOT, system::host_constants()),
    };
    Ok(Box::new(driver))
}

#[cfg(not(target_os = "linux"))]
fn procfs_driver(_config: &Config) -> anyhow::Result<Box<dyn PlatformDriver>> {
    anyhow::bail!("no process driver for this platform; use --fixture")
}
