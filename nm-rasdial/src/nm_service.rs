// NetworkManager access via D-Bus

//! Connection-management service interface
//!
//! [`NetworkService`] is the narrow set of calls the helper needs from
//! NetworkManager. [`DbusNetworkService`] implements it over the system bus;
//! tests substitute an in-memory implementation.

use crate::types::{ActiveConnection, ActiveState, Device, Profile};
use anyhow::{Context, Result};
use std::collections::HashMap;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{proxy, Connection};

/// Calls made against the connection-management service
#[allow(async_fn_in_trait)]
pub trait NetworkService {
    /// All stored profiles, with their identifying settings resolved
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// All active connections, VPN or not
    async fn list_active_connections(&self) -> Result<Vec<ActiveConnection>>;

    /// All devices known to the service
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Start activating `profile` on `device` (service default when `None`).
    ///
    /// Returns once the request is accepted, not when the connection is up.
    async fn activate(&self, profile: &Profile, device: Option<&Device>) -> Result<()>;

    /// Tear down an active connection
    async fn deactivate(&self, active: &ActiveConnection) -> Result<()>;
}

/// D-Bus proxy for NetworkManager
#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
trait NetworkManager {
    /// Activate a stored connection
    fn activate_connection(
        &self,
        connection: &ObjectPath<'_>,
        device: &ObjectPath<'_>,
        specific_object: &ObjectPath<'_>,
    ) -> zbus::Result<OwnedObjectPath>;

    /// Deactivate an active connection
    fn deactivate_connection(&self, active_connection: &ObjectPath<'_>) -> zbus::Result<()>;

    /// List the object paths of all network devices
    fn get_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    /// Get all active connections
    #[zbus(property)]
    fn active_connections(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

/// D-Bus proxy for the settings service
#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager/Settings"
)]
trait Settings {
    /// List the object paths of all stored connections
    fn list_connections(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

/// D-Bus proxy for a stored connection
#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings.Connection",
    default_service = "org.freedesktop.NetworkManager"
)]
trait SettingsConnection {
    /// Get the settings map, secrets excluded
    fn get_settings(&self) -> zbus::Result<HashMap<String, HashMap<String, OwnedValue>>>;
}

/// D-Bus proxy for active connection
#[proxy(
    interface = "org.freedesktop.NetworkManager.Connection.Active",
    default_service = "org.freedesktop.NetworkManager"
)]
trait NmActiveConnection {
    /// Get the connection ID
    #[zbus(property)]
    fn id(&self) -> zbus::Result<String>;

    /// Get the connection UUID
    #[zbus(property)]
    fn uuid(&self) -> zbus::Result<String>;

    /// Whether this is a VPN connection
    #[zbus(property)]
    fn vpn(&self) -> zbus::Result<bool>;

    /// Get the activation state
    #[zbus(property)]
    fn state(&self) -> zbus::Result<u32>;
}

/// D-Bus proxy for a network device
#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
trait NmDevice {
    /// Get the interface name
    #[zbus(property)]
    fn interface(&self) -> zbus::Result<String>;

    /// Get the device state
    #[zbus(property)]
    fn state(&self) -> zbus::Result<u32>;

    /// Whether NetworkManager manages the device
    #[zbus(property)]
    fn managed(&self) -> zbus::Result<bool>;
}

/// Read a string out of the `connection` settings section
fn connection_setting(
    settings: &HashMap<String, HashMap<String, OwnedValue>>,
    key: &str,
) -> Option<String> {
    match settings.get("connection")?.get(key).map(|v| &**v) {
        Some(Value::Str(s)) => Some(s.as_str().to_string()),
        _ => None,
    }
}

/// NetworkManager over the system D-Bus
pub struct DbusNetworkService {
    connection: Connection,
}

impl DbusNetworkService {
    /// Connect to the system bus
    pub async fn new() -> Result<Self> {
        let connection = Connection::system()
            .await
            .context("Failed to connect to system D-Bus")?;

        Ok(Self { connection })
    }

    async fn nm(&self) -> Result<NetworkManagerProxy<'_>> {
        NetworkManagerProxy::new(&self.connection)
            .await
            .context("Failed to create NetworkManager proxy")
    }

    async fn profile(&self, path: &OwnedObjectPath) -> Result<Profile> {
        let conn = SettingsConnectionProxy::builder(&self.connection)
            .path(path)?
            .build()
            .await?;

        let settings = conn
            .get_settings()
            .await
            .with_context(|| format!("Failed to read settings of {}", path.as_str()))?;

        Ok(Profile {
            path: path.as_str().to_string(),
            id: connection_setting(&settings, "id").unwrap_or_default(),
            uuid: connection_setting(&settings, "uuid").unwrap_or_default(),
            conn_type: connection_setting(&settings, "type").unwrap_or_default(),
        })
    }
}

impl NetworkService for DbusNetworkService {
    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let settings = SettingsProxy::new(&self.connection)
            .await
            .context("Failed to create Settings proxy")?;

        let paths = settings
            .list_connections()
            .await
            .context("Failed to list connections")?;

        let mut profiles = Vec::with_capacity(paths.len());
        for path in &paths {
            profiles.push(self.profile(path).await?);
        }
        Ok(profiles)
    }

    async fn list_active_connections(&self) -> Result<Vec<ActiveConnection>> {
        let paths = self
            .nm()
            .await?
            .active_connections()
            .await
            .context("Failed to list active connections")?;

        let mut active = Vec::with_capacity(paths.len());
        for path in &paths {
            let proxy = NmActiveConnectionProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;

            active.push(ActiveConnection {
                path: path.as_str().to_string(),
                id: proxy.id().await?,
                uuid: proxy.uuid().await?,
                vpn: proxy.vpn().await?,
                state: ActiveState::from(proxy.state().await?),
            });
        }
        Ok(active)
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        let paths = self
            .nm()
            .await?
            .get_devices()
            .await
            .context("Failed to list devices")?;

        let mut devices = Vec::with_capacity(paths.len());
        for path in &paths {
            let proxy = NmDeviceProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;

            devices.push(Device {
                path: path.as_str().to_string(),
                interface: proxy.interface().await?,
                state: proxy.state().await?,
                managed: proxy.managed().await?,
            });
        }
        Ok(devices)
    }

    async fn activate(&self, profile: &Profile, device: Option<&Device>) -> Result<()> {
        let connection = ObjectPath::try_from(profile.path.as_str())
            .with_context(|| format!("Invalid profile path: {}", profile.path))?;
        let device = match device {
            Some(d) => ObjectPath::try_from(d.path.as_str())
                .with_context(|| format!("Invalid device path: {}", d.path))?,
            None => ObjectPath::from_static_str_unchecked("/"),
        };
        let root = ObjectPath::from_static_str_unchecked("/");

        let active = self
            .nm()
            .await?
            .activate_connection(&connection, &device, &root)
            .await
            .with_context(|| format!("Failed to activate {}", profile.id))?;

        log::debug!("Activation of {} started as {}", profile.id, active.as_str());
        Ok(())
    }

    async fn deactivate(&self, active: &ActiveConnection) -> Result<()> {
        let path = ObjectPath::try_from(active.path.as_str())
            .with_context(|| format!("Invalid active connection path: {}", active.path))?;

        self.nm()
            .await?
            .deactivate_connection(&path)
            .await
            .with_context(|| format!("Failed to deactivate {}", active.id))
    }
}
