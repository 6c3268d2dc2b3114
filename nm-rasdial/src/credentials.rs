// Stored VPN credential rewrite

//! Credential rewrite and reload
//!
//! Writes a new user and password into a profile's keyfile, then tells
//! NetworkManager to re-read its profiles from disk.

use crate::error::VpnError;
use crate::keyfile::Keyfile;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// `NM_SETTING_SECRET_FLAG_NONE`: the secret lives in the profile file
const PASSWORD_FLAGS_STORED: &str = "0";

/// Suffix modern NetworkManager gives keyfiles
const KEYFILE_EXTENSION: &str = "nmconnection";

/// Reject names that would escape the connections directory
fn validate_profile_name(name: &str) -> Result<(), VpnError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(VpnError::InvalidProfileName(name.to_string()));
    }
    Ok(())
}

/// Locate the keyfile of profile `name` inside `dir`.
///
/// Tries `<dir>/<name>` first, then `<dir>/<name>.nmconnection`. When neither
/// exists the first candidate is returned so the read reports it.
pub fn profile_path(dir: &Path, name: &str) -> Result<PathBuf> {
    validate_profile_name(name)?;

    let plain = dir.join(name);
    if plain.exists() {
        return Ok(plain);
    }

    let suffixed = dir.join(format!("{}.{}", name, KEYFILE_EXTENSION));
    if suffixed.exists() {
        return Ok(suffixed);
    }

    Ok(plain)
}

/// Set `vpn.user`, `vpn.password-flags=0` and `vpn-secrets.password` in the
/// keyfile at `path`, rewriting it in place. Every other line is preserved.
pub fn rewrite_credentials(path: &Path, user: &str, password: &str) -> Result<()> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile {}", path.display()))?;

    let mut keyfile = Keyfile::parse(&contents);
    keyfile.set("vpn", "user", user);
    keyfile.set("vpn", "password-flags", PASSWORD_FLAGS_STORED);
    keyfile.add_section("vpn-secrets");
    keyfile.set("vpn-secrets", "password", password);

    fs::write(path, keyfile.to_string())
        .with_context(|| format!("Failed to write profile {}", path.display()))?;

    log::info!("Updated credentials in {}", path.display());
    Ok(())
}

/// Run an external command, returning whether it exited successfully
pub async fn run_command(argv: &[String]) -> Result<bool> {
    let (program, args) = argv.split_first().context("Empty command")?;

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute '{}'", argv.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::warn!("'{}' failed: {}", argv.join(" "), stderr.trim());
    }

    Ok(output.status.success())
}

/// Ask NetworkManager to reload profiles from disk
pub async fn reload_connections(reload_command: &[String]) -> Result<bool> {
    log::debug!("Reloading connection profiles");
    run_command(reload_command).await
}
