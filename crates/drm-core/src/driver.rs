//! Driver-supplied identity and hooks.

use serde::Serialize;

use crate::version::SetVersion;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DriverVersion {
    pub major: i32,
    pub minor: i32,
    pub patchlevel: i32,
}

/// The driver a device was attached by.
///
/// Only identity and the version-change hook are consumed by the control plane.
pub trait DrmDriver: Send + Sync {
    /// Short name; also the prefix of the device display name.
    fn name(&self) -> &str;
    fn desc(&self) -> &str;
    /// Release date, `YYYYMMDD`.
    fn date(&self) -> &str;
    fn version(&self) -> DriverVersion;

    /// Called after a client successfully negotiates the driver interface version.
    ///
    /// `requested` carries the values the client asked for, before the response is filled in.
    fn set_version(&self, _requested: &SetVersion) {}
}

/// Plain driver description for drivers without version hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: String,
    pub desc: String,
    pub date: String,
    pub version: DriverVersion,
}

impl DrmDriver for DriverInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn desc(&self) -> &str {
        &self.desc
    }

    fn date(&self) -> &str {
        &self.date
    }

    fn version(&self) -> DriverVersion {
        self.version
    }
}
