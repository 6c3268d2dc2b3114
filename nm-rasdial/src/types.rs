// Shared types between the helper, the service adapter and the CLI

//! Shared data structures
//!
//! This module defines the views of NetworkManager objects the helper works
//! with (profiles, active connections, devices), the active-connection state
//! machine as reported by the service, and the configuration structures.

use serde::Deserialize;

/// `NM_DEVICE_STATE_ACTIVATED`
pub const NM_DEVICE_STATE_ACTIVATED: u32 = 100;

/// Connection type string NetworkManager uses for VPN profiles
pub const VPN_CONNECTION_TYPE: &str = "vpn";

/// A stored connection profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// D-Bus object path of the settings connection
    pub path: String,
    /// Human readable name (`connection.id`)
    pub id: String,
    /// Stable identifier (`connection.uuid`)
    pub uuid: String,
    /// Profile type (`connection.type`)
    pub conn_type: String,
}

impl Profile {
    /// Whether this profile describes a VPN connection
    pub fn is_vpn(&self) -> bool {
        self.conn_type == VPN_CONNECTION_TYPE
    }
}

/// Active connection states (`NMActiveConnectionState`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    /// State not reported
    Unknown,
    /// Network connection is being prepared
    Activating,
    /// Connection is up
    Activated,
    /// Connection is being torn down
    Deactivating,
    /// Connection is gone
    Deactivated,
}

impl ActiveState {
    /// Activated or deactivated
    pub fn is_terminal(self) -> bool {
        matches!(self, ActiveState::Activated | ActiveState::Deactivated)
    }
}

impl From<u32> for ActiveState {
    fn from(value: u32) -> Self {
        match value {
            1 => ActiveState::Activating,
            2 => ActiveState::Activated,
            3 => ActiveState::Deactivating,
            4 => ActiveState::Deactivated,
            _ => ActiveState::Unknown,
        }
    }
}

/// A live instance of a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConnection {
    /// D-Bus object path of the active connection
    pub path: String,
    /// Name of the profile it was started from
    pub id: String,
    /// UUID of the profile it was started from
    pub uuid: String,
    /// Whether the service reports it as a VPN connection
    pub vpn: bool,
    /// Current state
    pub state: ActiveState,
}

/// A network interface known to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// D-Bus object path of the device
    pub path: String,
    /// Interface name (e.g. `wlan0`)
    pub interface: String,
    /// Raw `NMDeviceState` value
    pub state: u32,
    /// Whether NetworkManager manages this device
    pub managed: bool,
}

impl Device {
    /// Eligible as an activation target: up and managed
    pub fn is_usable(&self) -> bool {
        self.state == NM_DEVICE_STATE_ACTIVATED && self.managed
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// `[general]` section
    #[serde(default)]
    pub general: GeneralConfig,
    /// `[network]` section
    #[serde(default)]
    pub network: NetworkConfig,
    /// `[probe]` section
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// General configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// Default log filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// NetworkManager related options
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Directory holding the keyfile profiles
    #[serde(default = "default_connections_dir")]
    pub connections_dir: String,
    /// Command telling NetworkManager to re-read profiles from disk
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
    /// Command restarting the NetworkManager service
    #[serde(default = "default_restart_command")]
    pub restart_command: Vec<String>,
    /// Seconds to wait for an activation to settle
    #[serde(default = "default_activation_timeout")]
    pub activation_timeout: u64,
    /// Milliseconds between two activation state checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connections_dir: default_connections_dir(),
            reload_command: default_reload_command(),
            restart_command: default_restart_command(),
            activation_timeout: default_activation_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Internet reachability probe options
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    /// URL fetched to decide whether the internet is reachable
    #[serde(default = "default_probe_url")]
    pub url: String,
    /// Seconds before a single probe is considered failed
    #[serde(default = "default_probe_timeout")]
    pub timeout: u64,
    /// Probes attempted after a service restart
    #[serde(default = "default_probe_max_tries")]
    pub max_tries: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: default_probe_url(),
            timeout: default_probe_timeout(),
            max_tries: default_probe_max_tries(),
        }
    }
}

// Default values for configuration
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_connections_dir() -> String {
    "/etc/NetworkManager/system-connections".to_string()
}

fn default_reload_command() -> Vec<String> {
    vec!["nmcli".into(), "connection".into(), "reload".into()]
}

fn default_restart_command() -> Vec<String> {
    vec!["systemctl".into(), "restart".into(), "NetworkManager".into()]
}

fn default_activation_timeout() -> u64 {
    20
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_probe_url() -> String {
    "http://nmcheck.gnome.org/check_network_status.txt".to_string()
}

fn default_probe_timeout() -> u64 {
    8
}

fn default_probe_max_tries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_state_from_raw() {
        assert_eq!(ActiveState::from(0), ActiveState::Unknown);
        assert_eq!(ActiveState::from(1), ActiveState::Activating);
        assert_eq!(ActiveState::from(2), ActiveState::Activated);
        assert_eq!(ActiveState::from(3), ActiveState::Deactivating);
        assert_eq!(ActiveState::from(4), ActiveState::Deactivated);
        assert_eq!(ActiveState::from(42), ActiveState::Unknown);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ActiveState::Activated.is_terminal());
        assert!(ActiveState::Deactivated.is_terminal());
        assert!(!ActiveState::Activating.is_terminal());
        assert!(!ActiveState::Deactivating.is_terminal());
        assert!(!ActiveState::Unknown.is_terminal());
    }

    #[test]
    fn test_profile_is_vpn() {
        let mut profile = Profile {
            path: "/org/freedesktop/NetworkManager/Settings/1".to_string(),
            id: "office".to_string(),
            uuid: "0b6d3c9e-3f44-4b2a-9d7e-2d1f0c9a1a11".to_string(),
            conn_type: "vpn".to_string(),
        };
        assert!(profile.is_vpn());

        profile.conn_type = "802-11-wireless".to_string();
        assert!(!profile.is_vpn());
    }

    #[test]
    fn test_device_usable_requires_activated_and_managed() {
        let mut device = Device {
            path: "/org/freedesktop/NetworkManager/Devices/2".to_string(),
            interface: "wlan0".to_string(),
            state: NM_DEVICE_STATE_ACTIVATED,
            managed: true,
        };
        assert!(device.is_usable());

        device.managed = false;
        assert!(!device.is_usable());

        device.managed = true;
        device.state = 30; // disconnected
        assert!(!device.is_usable());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(
            config.network.connections_dir,
            "/etc/NetworkManager/system-connections"
        );
        assert_eq!(config.network.reload_command, ["nmcli", "connection", "reload"]);
        assert_eq!(config.network.activation_timeout, 20);
        assert_eq!(config.network.poll_interval_ms, 250);
        assert_eq!(config.probe.timeout, 8);
        assert_eq!(config.probe.max_tries, 3);
    }
}
