//! DRM device control plane.
//!
//! A [`Device`] owns the bus identity, the mapping and client registries, the counter bank and
//! the negotiated interface version. Clients reach it through [`Device::ioctl`] or the typed
//! handler methods; all shared state sits behind one device-wide lock.

#![forbid(unsafe_code)]

mod clients;
mod device;
mod error;
mod identity;
mod maps;

pub mod config;
pub mod driver;
pub mod file;
pub mod ioctl;
pub mod sis;
pub mod stats;
pub mod uaccess;
pub mod version;

pub use config::{ConfigError, DeviceConfig};
pub use device::Device;
pub use driver::{DriverInfo, DriverVersion, DrmDriver};
pub use error::{errno, DrmError, Result};
pub use file::{ClientInfo, Credentials, DrmFile};
pub use identity::MAX_UNIQUE_LEN;
pub use ioctl::{DrmClient, DrmMap, DrmUnique, DrmVersion, IoctlArg, IoctlFlags, IoctlNr};
pub use maps::{LocalMap, MapFlags, MapInfo, MapListEntry, MapType};
pub use stats::{HwLock, StatEntry, StatType, Stats, MAX_COUNTERS};
pub use uaccess::{Fault, SimUserMemory, UserMemory, UserPtr};
pub use version::{SetVersion, DRM_IF_MAJOR, DRM_IF_MINOR, VERSION_NOT_REQUESTED};

pub use drm_pci::{PciLocation, PciTopology};
