//! Interface and driver version negotiation.

use serde::Serialize;

use crate::device::Device;
use crate::error::{DrmError, Result};

/// Control-plane interface major version.
pub const DRM_IF_MAJOR: i32 = 1;
/// Highest supported interface minor version.
pub const DRM_IF_MINOR: i32 = 2;

/// Request value meaning "leave this side of the negotiation alone".
pub const VERSION_NOT_REQUESTED: i32 = -1;

/// Packs a major/minor pair into the ordering used for `interface_version`.
pub const fn if_version(major: i32, minor: i32) -> i32 {
    (major << 16) | minor
}

/// SetVersion request; overwritten in place with the supported versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SetVersion {
    pub di_major: i32,
    pub di_minor: i32,
    pub dd_major: i32,
    pub dd_minor: i32,
}

impl Default for SetVersion {
    fn default() -> Self {
        Self {
            di_major: VERSION_NOT_REQUESTED,
            di_minor: VERSION_NOT_REQUESTED,
            dd_major: VERSION_NOT_REQUESTED,
            dd_minor: VERSION_NOT_REQUESTED,
        }
    }
}

impl SetVersion {
    pub const fn interface(major: i32, minor: i32) -> Self {
        Self {
            di_major: major,
            di_minor: minor,
            dd_major: VERSION_NOT_REQUESTED,
            dd_minor: VERSION_NOT_REQUESTED,
        }
    }

    pub const fn driver(mut self, major: i32, minor: i32) -> Self {
        self.dd_major = major;
        self.dd_minor = minor;
        self
    }
}

impl Device {
    /// Negotiates the interface and driver versions requested in `sv`.
    ///
    /// On return `sv` always holds the supported interface version and the driver version,
    /// including when the request was rejected.
    pub fn set_version(&self, sv: &mut SetVersion) -> Result<()> {
        let result = self.negotiate_version(sv);

        let driver = self.driver.version();
        sv.di_major = DRM_IF_MAJOR;
        sv.di_minor = DRM_IF_MINOR;
        sv.dd_major = driver.major;
        sv.dd_minor = driver.minor;

        result
    }

    fn negotiate_version(&self, sv: &SetVersion) -> Result<()> {
        if sv.di_major != VERSION_NOT_REQUESTED {
            if sv.di_major != DRM_IF_MAJOR || !(0..=DRM_IF_MINOR).contains(&sv.di_minor) {
                tracing::warn!(
                    major = sv.di_major,
                    minor = sv.di_minor,
                    "unsupported interface version requested"
                );
                return Err(DrmError::InvalidArgument("unsupported interface version"));
            }

            let mut state = self.lock();
            state.if_version = state
                .if_version
                .max(if_version(sv.di_major, sv.di_minor));
            if sv.di_minor >= 1 {
                // Interface 1.1 ties the session to a concrete bus id. An id that already
                // exists (client-set or assigned earlier) is fine.
                if let Err(err) = self.auto_assign_unique(&mut state) {
                    tracing::debug!(%err, "bus id not auto-assigned");
                }
            }
        }

        if sv.dd_major != VERSION_NOT_REQUESTED {
            let driver = self.driver.version();
            if sv.dd_major != driver.major || !(0..=driver.minor).contains(&sv.dd_minor) {
                tracing::warn!(
                    major = sv.dd_major,
                    minor = sv.dd_minor,
                    driver = self.driver.name(),
                    "unsupported driver version requested"
                );
                return Err(DrmError::InvalidArgument("unsupported driver version"));
            }
            self.driver.set_version(sv);
        }

        Ok(())
    }

    /// Highest interface version negotiated so far, as packed by [`if_version`].
    pub fn interface_version(&self) -> i32 {
        self.lock().if_version
    }
}
