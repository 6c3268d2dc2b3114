// VPN operations on top of NetworkManager

//! VPN helper
//!
//! Lists, activates and deactivates VPN profiles through a [`NetworkService`],
//! and rewrites stored credentials before an activation when asked to.

use crate::config;
use crate::connectivity;
use crate::credentials;
use crate::error::VpnError;
use crate::nm_service::NetworkService;
use crate::privilege::RootCapability;
use crate::types::{ActiveConnection, ActiveState, Config, Device, Profile};
use crate::wait::{wait_until, PollPolicy};
use anyhow::Result;
use std::path::Path;

/// VPN operations against a connection-management service
pub struct VpnHelper<S> {
    service: S,
    config: Config,
    _root: RootCapability,
}

impl<S: NetworkService> VpnHelper<S> {
    /// Create a helper. Requires the root capability, checked by the caller once.
    pub fn new(service: S, config: Config, root: RootCapability) -> Self {
        Self {
            service,
            config,
            _root: root,
        }
    }

    /// Get the underlying service
    pub fn service(&self) -> &S {
        &self.service
    }

    /// All VPN profiles, in service order
    pub async fn list_vpn_connections(&self) -> Result<impl Iterator<Item = Profile>> {
        let profiles = self.service.list_profiles().await?;
        Ok(profiles.into_iter().filter(Profile::is_vpn))
    }

    /// First VPN profile whose name is `name`
    pub async fn get_vpn_connection(&self, name: &str) -> Result<Option<Profile>> {
        Ok(self.list_vpn_connections().await?.find(|p| p.id == name))
    }

    /// Active connections the service flags as VPN
    pub async fn get_active_vpn_connections(&self) -> Result<Vec<ActiveConnection>> {
        let active = self.service.list_active_connections().await?;
        Ok(active.into_iter().filter(|a| a.vpn).collect())
    }

    /// First device that is activated and managed
    pub async fn get_active_device(&self) -> Result<Option<Device>> {
        let devices = self.service.list_devices().await?;
        Ok(devices.into_iter().find(Device::is_usable))
    }

    /// Request activation of `profile` without waiting for it
    pub async fn activate_conn(&self, profile: &Profile) -> Result<()> {
        let device = self.get_active_device().await?;
        match &device {
            Some(d) => log::info!("Activating {} via {}", profile.id, d.interface),
            None => log::info!("Activating {} (no active device)", profile.id),
        }
        self.service.activate(profile, device.as_ref()).await
    }

    /// Request teardown of an active connection
    pub async fn deactivate_conn(&self, active: &ActiveConnection) -> Result<()> {
        log::info!("Deactivating {}", active.id);
        self.service.deactivate(active).await
    }

    /// Deactivate every active VPN connection, stopping at the first failure.
    ///
    /// Returns how many were deactivated.
    pub async fn disconnect(&self) -> Result<usize> {
        let active = self.get_active_vpn_connections().await?;
        if active.is_empty() {
            log::debug!("No active VPN connection to deactivate");
        }
        for conn in &active {
            self.deactivate_conn(conn).await?;
        }
        Ok(active.len())
    }

    /// Write new credentials into the stored profile `name` and reload.
    ///
    /// Returns whether the reload command succeeded. File errors are errors.
    pub async fn update_vpn_conf(&self, name: &str, user: &str, password: &str) -> Result<bool> {
        let dir = Path::new(&self.config.network.connections_dir);
        let path = credentials::profile_path(dir, name)?;
        credentials::rewrite_credentials(&path, user, password)?;
        credentials::reload_connections(&self.config.network.reload_command).await
    }

    /// Activate VPN `name`, optionally with new credentials.
    ///
    /// With `wait`, polls until the activation settles: `Ok(true)` once
    /// activated, [`VpnError::ActivationFailed`] as soon as it is deactivated
    /// or gone, `Ok(false)` if still pending at the timeout. Without `wait`,
    /// returns `Ok(true)` once the request is issued.
    pub async fn connect(
        &self,
        name: &str,
        user: Option<&str>,
        password: Option<&str>,
        wait: bool,
    ) -> Result<bool> {
        let user = user.filter(|u| !u.is_empty());
        let password = password.filter(|p| !p.is_empty());
        if user.is_some() && password.is_none() {
            return Err(VpnError::MissingPassword.into());
        }

        let profile = self
            .get_vpn_connection(name)
            .await?
            .ok_or_else(|| VpnError::NoSuchVpn(name.to_string()))?;

        if let (Some(user), Some(password)) = (user, password) {
            // Credentials must be on disk and reloaded before activation
            if !self.update_vpn_conf(name, user, password).await? {
                return Err(VpnError::ReloadFailed.into());
            }
        }

        self.activate_conn(&profile).await?;

        if !wait {
            return Ok(true);
        }

        let timeout = config::activation_timeout(&self.config);
        let policy = PollPolicy::new(timeout, config::poll_interval(&self.config));
        let connected = wait_until(policy, || self.activation_settled(&profile)).await?;

        if connected {
            log::info!("Connected to {}", profile.id);
        } else {
            log::warn!("{} still activating after {:?}", profile.id, timeout);
        }
        Ok(connected)
    }

    /// One poll of the activation of `profile`
    async fn activation_settled(&self, profile: &Profile) -> Result<bool> {
        let active = self.get_active_vpn_connections().await?;
        let state = active
            .iter()
            .find(|a| a.uuid == profile.uuid)
            .map(|a| a.state);

        log::debug!("{} state: {:?}", profile.id, state);
        match state {
            None | Some(ActiveState::Deactivated) => {
                Err(VpnError::ActivationFailed(profile.id.clone()).into())
            }
            Some(state) => Ok(state == ActiveState::Activated),
        }
    }

    /// Restart NetworkManager and report whether the internet came back
    pub async fn restart_network_manager(&self) -> Result<bool> {
        connectivity::restart_network_manager(
            &self.config.network.restart_command,
            &self.config.probe,
        )
        .await
    }
}
