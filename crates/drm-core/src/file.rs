//! Per-client open file state.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::uaccess::UserMemory;

/// Process credentials captured when the client opened the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub pid: u32,
    pub uid: u32,
    /// Holds the administrative capability required by root-only ioctls.
    pub admin: bool,
}

/// One connected client.
///
/// Identity fields are fixed at open. Authentication and mastership are flipped by the
/// authentication path; `ioctl_count` is bumped by the dispatcher.
pub struct DrmFile {
    id: u64,
    creds: Credentials,
    authenticated: AtomicBool,
    master: AtomicBool,
    magic: AtomicU32,
    ioctl_count: AtomicU64,
    mem: Arc<dyn UserMemory>,
}

impl core::fmt::Debug for DrmFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DrmFile")
            .field("id", &self.id)
            .field("creds", &self.creds)
            .field("authenticated", &self.is_authenticated())
            .field("master", &self.is_master())
            .field("magic", &self.magic())
            .field("ioctl_count", &self.ioctl_count())
            .finish_non_exhaustive()
    }
}

impl DrmFile {
    pub(crate) fn new(id: u64, creds: Credentials, mem: Arc<dyn UserMemory>) -> Self {
        Self {
            id,
            creds,
            authenticated: AtomicBool::new(false),
            master: AtomicBool::new(false),
            magic: AtomicU32::new(0),
            ioctl_count: AtomicU64::new(0),
            mem,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.creds.pid
    }

    pub fn uid(&self) -> u32 {
        self.creds.uid
    }

    pub fn is_admin(&self) -> bool {
        self.creds.admin
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::Release);
    }

    pub fn is_master(&self) -> bool {
        self.master.load(Ordering::Acquire)
    }

    pub(crate) fn set_master(&self, master: bool) {
        self.master.store(master, Ordering::Release);
    }

    /// Authentication token handed out to this client.
    pub fn magic(&self) -> u32 {
        self.magic.load(Ordering::Acquire)
    }

    pub fn set_magic(&self, magic: u32) {
        self.magic.store(magic, Ordering::Release);
    }

    pub fn ioctl_count(&self) -> u64 {
        self.ioctl_count.load(Ordering::Relaxed)
    }

    pub(crate) fn count_ioctl(&self) {
        self.ioctl_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn user_memory(&self) -> &dyn UserMemory {
        self.mem.as_ref()
    }

    pub(crate) fn info(&self) -> ClientInfo {
        ClientInfo {
            auth: self.is_authenticated(),
            pid: self.pid(),
            uid: self.uid(),
            magic: self.magic(),
            iocs: self.ioctl_count(),
        }
    }
}

/// Snapshot of a client record as reported by GetClient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub auth: bool,
    pub pid: u32,
    pub uid: u32,
    pub magic: u32,
    pub iocs: u64,
}
