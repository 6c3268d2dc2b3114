//! Conditions callers need to tell apart
//!
//! Everything else travels as a plain [`anyhow::Error`] with context. These
//! are wrapped in `anyhow::Error` too and recovered with `downcast_ref`.

use thiserror::Error;

/// Typed VPN helper failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VpnError {
    /// The process lacks the privilege to edit profiles or drive the service
    #[error("need to be root (effective uid {0})")]
    PermissionDenied(u32),

    /// A username was given without a password
    #[error("password must be set when a user is given")]
    MissingPassword,

    /// No VPN profile carries this name
    #[error("there's no vpn called \"{0}\"")]
    NoSuchVpn(String),

    /// The activation disappeared or reached the deactivated state
    #[error("unable to connect to vpn \"{0}\"")]
    ActivationFailed(String),

    /// The reload command exited unsuccessfully after a credential rewrite
    #[error("NetworkManager did not reload connection profiles")]
    ReloadFailed,

    /// The name cannot be mapped to a file inside the connections directory
    #[error("invalid profile name: \"{0}\"")]
    InvalidProfileName(String),
}
