//! One-time root check for mutation-capable components

use crate::error::VpnError;

/// Proof that the process ran with effective uid 0 when it was acquired.
///
/// Components that edit profiles or drive the service take one of these in
/// their constructor; the check is not repeated afterwards.
#[derive(Debug)]
pub struct RootCapability {
    _private: (),
}

impl RootCapability {
    /// Check the effective uid
    pub fn acquire() -> Result<Self, VpnError> {
        Self::check(effective_uid())
    }

    fn check(euid: u32) -> Result<Self, VpnError> {
        if euid != 0 {
            return Err(VpnError::PermissionDenied(euid));
        }
        Ok(Self { _private: () })
    }

    #[cfg(test)]
    pub(crate) fn assume() -> Self {
        Self { _private: () }
    }
}

/// Get the effective user ID
fn effective_uid() -> u32 {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() }
    }
    #[cfg(not(unix))]
    {
        u32::MAX
    }
}
