//! Mapping registry: descriptors for memory regions the device exposes.
//!
//! Entries are created and torn down by the mapping paths; the control plane only reads them by
//! position. Positions are dense and follow registration order, so an index may refer to a
//! different entry after a concurrent add or remove.

use bitflags::bitflags;
use serde::Serialize;

use crate::device::Device;
use crate::error::{alloc_slot, DrmError, Result};

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    #[default]
    FrameBuffer = 0,
    Registers = 1,
    Shm = 2,
    Agp = 3,
    ScatterGather = 4,
    Consistent = 5,
}

bitflags! {
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
    pub struct MapFlags: u32 {
        /// Cannot be mapped to user-virtual.
        const RESTRICTED = 0x01;
        const READ_ONLY = 0x02;
        /// Physical pages locked.
        const LOCKED = 0x04;
        /// Kernel requires access.
        const KERNEL = 0x08;
        /// Use write-combining if available.
        const WRITE_COMBINING = 0x10;
        /// SHM page that contains the hardware lock.
        const CONTAINS_LOCK = 0x20;
        /// Removable mapping.
        const REMOVABLE = 0x40;
        /// Managed by the driver.
        const DRIVER = 0x80;
    }
}

/// Backing description of a registered region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocalMap {
    pub offset: u64,
    pub size: u64,
    pub map_type: MapType,
    pub flags: MapFlags,
    /// MTRR slot covering the region, or -1 when none was assigned.
    pub mtrr: i32,
}

/// Registry slot.
///
/// `map` is `None` while a region is still being set up or after it was released but before
/// the slot itself was unlinked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapListEntry {
    pub map: Option<LocalMap>,
    /// Opaque handle clients pass to mmap.
    pub user_token: u64,
}

impl MapListEntry {
    pub const fn new(map: LocalMap, user_token: u64) -> Self {
        Self {
            map: Some(map),
            user_token,
        }
    }

    pub const fn unbacked(user_token: u64) -> Self {
        Self {
            map: None,
            user_token,
        }
    }
}

/// Snapshot returned by GetMap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MapInfo {
    pub offset: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub map_type: MapType,
    pub flags: MapFlags,
    pub handle: u64,
    pub mtrr: i32,
}

impl Device {
    /// Looks up the entry at exactly position `index`.
    pub fn get_map(&self, index: i32) -> Result<MapInfo> {
        let state = self.lock();
        if index < 0 {
            return Err(DrmError::InvalidArgument("negative map index"));
        }

        let entry = state
            .maps
            .get(index as usize)
            .ok_or(DrmError::NotFound {
                index: index.into(),
            })?;
        let map = entry
            .map
            .ok_or(DrmError::InvalidArgument("map entry has no backing map"))?;

        Ok(MapInfo {
            offset: map.offset,
            size: map.size,
            map_type: map.map_type,
            flags: map.flags,
            handle: entry.user_token,
            mtrr: map.mtrr,
        })
    }

    /// Appends a registry entry; used by the mapping creation path.
    pub fn add_map(&self, entry: MapListEntry) -> Result<()> {
        let mut state = self.lock();
        alloc_slot(&mut state.maps)?;
        state.maps.push(entry);
        tracing::debug!(
            token = entry.user_token,
            backed = entry.map.is_some(),
            "map registered"
        );
        Ok(())
    }

    /// Unlinks the first entry with `user_token`; used by the teardown path.
    pub fn remove_map(&self, user_token: u64) -> bool {
        let mut state = self.lock();
        match state.maps.iter().position(|e| e.user_token == user_token) {
            Some(pos) => {
                state.maps.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn map_count(&self) -> usize {
        self.lock().maps.len()
    }
}
