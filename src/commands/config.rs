//! Config command implementation.
//!
//! Writes the default configuration in the requested format.

use std::fs;
use std::path::PathBuf;

use tensorscan::config::{add_config_comments, Config, DEFAULT_CONFIG_FILE};

use crate::cli::ConfigFormat;

/// Serializes `config` in `format`.
pub fn render_config(config: &Config, format: ConfigFormat) -> anyhow::Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Generates configuration files
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> anyhow::Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}
