//! Write-once bus identity of the device.

use drm_pci::{format_canonical_bus_id, parse_legacy_bus_id, CANONICAL_BUS_ID_CAPACITY};

use crate::device::{Device, DeviceState};
use crate::error::{alloc_zeroed, DrmError, Result};
use crate::uaccess::{UserMemory, UserPtr};

/// Longest bus id a client may submit.
pub const MAX_UNIQUE_LEN: usize = 1024;

/// Unique bus id plus the display name derived from it.
///
/// Both are committed together and never change afterwards.
#[derive(Debug, Default)]
pub(crate) struct Identity {
    unique: Option<Vec<u8>>,
    devname: Option<String>,
}

impl Identity {
    pub(crate) fn is_set(&self) -> bool {
        self.unique.is_some()
    }

    pub(crate) fn unique(&self) -> &[u8] {
        self.unique.as_deref().unwrap_or_default()
    }

    pub(crate) fn devname(&self) -> Option<&str> {
        self.devname.as_deref()
    }

    fn commit(&mut self, unique: Vec<u8>, driver_name: &str) {
        debug_assert!(!self.is_set());
        self.devname = Some(display_name(driver_name, &unique));
        self.unique = Some(unique);
    }
}

/// `<driver>@<id>`, where the id ends at its first NUL.
fn display_name(driver_name: &str, unique: &[u8]) -> String {
    format!("{driver_name}@{}", String::from_utf8_lossy(c_str(unique)))
}

fn c_str(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

impl Device {
    /// Copies the bus id to `dst` if `capacity` can hold all of it.
    ///
    /// Returns the stored length either way; a short buffer receives nothing, so callers probe
    /// with zero capacity and then fetch with the reported length.
    pub fn get_unique(
        &self,
        capacity: usize,
        dst: UserPtr,
        mem: &dyn UserMemory,
    ) -> Result<usize> {
        let unique = self.lock().identity.unique().to_vec();
        if capacity >= unique.len() {
            mem.copy_to_user(dst, &unique)?;
        }
        Ok(unique.len())
    }

    /// Sets the bus id from a client buffer, then verifies it names this device.
    ///
    /// The candidate must read `PCI:<bus>:<slot>:<function>` where the first field carries the
    /// domain in bits 8 and up. Once copied in, the id is committed before it is checked: a
    /// candidate that fails to parse or names another device is rejected but stays stored, so
    /// later attempts see `AlreadySet`.
    pub fn set_unique(&self, src: UserPtr, len: usize, mem: &dyn UserMemory) -> Result<()> {
        let mut state = self.lock();
        if state.identity.is_set() {
            return Err(DrmError::AlreadySet);
        }
        if len == 0 || len > MAX_UNIQUE_LEN {
            return Err(DrmError::InvalidArgument("bus id length out of range"));
        }

        let mut unique = alloc_zeroed(len)?;
        mem.copy_from_user(&mut unique, src)?;

        state.identity.commit(unique, self.driver.name());
        tracing::info!(
            name = state.identity.devname().unwrap_or_default(),
            "bus id set by client"
        );

        let loc = self.topology.location();
        let requested = parse_legacy_bus_id(c_str(state.identity.unique())).map_err(|err| {
            tracing::warn!(%err, "rejecting unparsable bus id");
            DrmError::InvalidArgument("bus id is not PCI:<bus>:<slot>:<func>")
        })?;
        if !requested.matches(loc) {
            tracing::warn!(
                domain = requested.domain(),
                bus = requested.bus(),
                slot = requested.slot,
                function = requested.function,
                device = %loc,
                "bus id does not match device"
            );
            return Err(DrmError::InvalidArgument("bus id does not match device"));
        }
        Ok(())
    }

    /// Derives the canonical `pci:DDDD:BB:SS.F` id from the enumerated location.
    ///
    /// The id is stored in a fixed 40-byte, NUL-padded buffer, so its reported length is 40.
    pub(crate) fn auto_assign_unique(&self, state: &mut DeviceState) -> Result<()> {
        if state.identity.is_set() {
            return Err(DrmError::AlreadySet);
        }

        let mut unique = alloc_zeroed(CANONICAL_BUS_ID_CAPACITY)?;
        let len = format_canonical_bus_id(self.topology.location(), &mut unique);
        if len > CANONICAL_BUS_ID_CAPACITY {
            // Keep the truncated id; the device stays usable under it.
            tracing::error!(len, "bus id overflowed its buffer");
        }

        state.identity.commit(unique, self.driver.name());
        tracing::info!(
            name = state.identity.devname().unwrap_or_default(),
            "bus id assigned"
        );
        Ok(())
    }

    /// Current bus id, if any, including trailing NUL padding.
    pub fn unique(&self) -> Option<Vec<u8>> {
        let state = self.lock();
        state.identity.is_set().then(|| state.identity.unique().to_vec())
    }

    /// `<driver>@<bus id>` once the bus id is set.
    pub fn display_name(&self) -> Option<String> {
        self.lock().identity.devname().map(str::to_owned)
    }
}
