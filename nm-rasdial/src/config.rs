// Configuration file parser

//! Configuration file parsing and validation
//!
//! This module handles loading the optional TOML configuration file and
//! validating its contents. Every key has a built-in default, so a host
//! without a configuration file behaves like a stock NetworkManager install.

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nm-rasdial/config.toml";

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

    let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

    validate_config(&config)?;
    Ok(config)
}

/// Load configuration, falling back to defaults when `path` does not exist
///
/// Used for the default location only: a path the user named explicitly
/// must exist and goes through [`load_config`].
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config> {
    if !path.as_ref().exists() {
        return Ok(Config::default());
    }
    load_config(path)
}

/// Validate configuration values
fn validate_config(config: &Config) -> Result<()> {
    if config.network.connections_dir.is_empty() {
        anyhow::bail!("network.connections_dir cannot be empty");
    }

    if config.network.reload_command.is_empty() {
        anyhow::bail!("network.reload_command cannot be empty");
    }

    if config.network.restart_command.is_empty() {
        anyhow::bail!("network.restart_command cannot be empty");
    }

    if config.network.activation_timeout == 0 {
        anyhow::bail!("network.activation_timeout must be > 0");
    }

    if config.network.poll_interval_ms == 0 {
        anyhow::bail!("network.poll_interval_ms must be > 0");
    }

    if config.probe.url.is_empty() {
        anyhow::bail!("probe.url cannot be empty");
    }

    if config.probe.timeout == 0 {
        anyhow::bail!("probe.timeout must be > 0");
    }

    Ok(())
}

/// Overall activation wait budget
pub fn activation_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.network.activation_timeout)
}

/// Delay between two polls of the service
pub fn poll_interval(config: &Config) -> Duration {
    Duration::from_millis(config.network.poll_interval_ms)
}
