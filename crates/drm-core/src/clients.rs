//! Client registry.

use std::sync::Arc;

use crate::device::Device;
use crate::error::{alloc_slot, DrmError, Result};
use crate::file::{ClientInfo, Credentials, DrmFile};
use crate::stats::StatType;
use crate::uaccess::UserMemory;

impl Device {
    /// Registers a newly connected client. The first client on an idle device becomes master.
    pub fn open_client(
        &self,
        creds: Credentials,
        mem: Arc<dyn UserMemory>,
    ) -> Result<Arc<DrmFile>> {
        let mut state = self.lock();
        alloc_slot(&mut state.clients)?;

        let id = state.next_client_id;
        state.next_client_id += 1;
        let file = Arc::new(DrmFile::new(id, creds, mem));
        if state.clients.is_empty() {
            file.set_master(true);
        }
        state.clients.push(file.clone());
        self.counters.inc(StatType::Opens);

        tracing::debug!(
            client = id,
            pid = creds.pid,
            uid = creds.uid,
            master = file.is_master(),
            "client opened"
        );
        Ok(file)
    }

    /// Unlinks a client record. Returns false if it was not registered.
    pub fn close_client(&self, file: &DrmFile) -> bool {
        let mut state = self.lock();
        let Some(pos) = state.clients.iter().position(|c| c.id() == file.id()) else {
            return false;
        };
        state.clients.remove(pos);
        self.counters.inc(StatType::Closes);
        tracing::debug!(client = file.id(), pid = file.pid(), "client closed");
        true
    }

    /// Returns the first client at or after position `cursor`.
    ///
    /// A client disconnecting between calls shifts later records down, so an enumeration
    /// driven by an incrementing cursor skips forward instead of failing.
    pub fn get_client(&self, cursor: i32) -> Result<ClientInfo> {
        let state = self.lock();
        let skip = usize::try_from(cursor).unwrap_or(0);
        state
            .clients
            .iter()
            .nth(skip)
            .map(|c| c.info())
            .ok_or(DrmError::NotFound {
                index: cursor.into(),
            })
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }
}
