//! The device aggregate and its lock.

use std::sync::{Arc, Mutex, MutexGuard};

use drm_pci::{PciLocation, PciTopology};

use crate::config::DeviceConfig;
use crate::driver::DrmDriver;
use crate::file::DrmFile;
use crate::identity::Identity;
use crate::maps::MapListEntry;
use crate::stats::{Counters, HwLock, Stats};

/// State guarded by the device lock.
#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    pub(crate) identity: Identity,
    pub(crate) if_version: i32,
    pub(crate) maps: Vec<MapListEntry>,
    pub(crate) clients: Vec<Arc<DrmFile>>,
    pub(crate) hw_lock: Option<Arc<HwLock>>,
    pub(crate) next_client_id: u64,
}

/// One attached device instance.
///
/// Every control-plane operation that touches the identity, the registries or the negotiated
/// version holds [`Device::lock`] for its whole critical section.
pub struct Device {
    pub(crate) driver: Arc<dyn DrmDriver>,
    pub(crate) topology: Arc<dyn PciTopology>,
    pub(crate) counters: Counters,
    state: Mutex<DeviceState>,
}

impl core::fmt::Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("driver", &self.driver.name())
            .field("location", &self.topology.location())
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl Device {
    pub fn new(
        driver: Arc<dyn DrmDriver>,
        topology: Arc<dyn PciTopology>,
        config: DeviceConfig,
    ) -> Self {
        tracing::debug!(
            driver = driver.name(),
            location = %topology.location(),
            counters = config.counters().len(),
            "device attached"
        );
        Self {
            driver,
            topology,
            counters: Counters::new(config.counters().to_vec()),
            state: Mutex::new(DeviceState::default()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn driver(&self) -> &dyn DrmDriver {
        self.driver.as_ref()
    }

    pub fn location(&self) -> PciLocation {
        self.topology.location()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Snapshot of every configured counter. Never fails.
    pub fn get_stats(&self) -> Stats {
        let state = self.lock();
        self.counters.snapshot(state.hw_lock.as_deref())
    }

    /// Installs the hardware lock reported by the `LOCK` counter.
    pub fn install_hw_lock(&self, lock: Arc<HwLock>) {
        self.lock().hw_lock = Some(lock);
    }

    pub fn remove_hw_lock(&self) -> Option<Arc<HwLock>> {
        self.lock().hw_lock.take()
    }
}
