#![allow(dead_code)]

use std::sync::Arc;

use drm_core::sis::SisDriver;
use drm_core::{
    Credentials, Device, DeviceConfig, DrmFile, PciLocation, SimUserMemory, UserMemory, UserPtr,
};

pub const USER_BASE: u64 = 0x10_0000;
pub const USER_SIZE: usize = 0x4000;

pub fn device_at(loc: PciLocation) -> Device {
    Device::new(
        Arc::new(SisDriver::default()),
        Arc::new(loc),
        DeviceConfig::default(),
    )
}

/// Client with its own address window.
pub struct TestClient {
    pub file: Arc<DrmFile>,
    pub mem: Arc<SimUserMemory>,
}

impl TestClient {
    pub fn open(dev: &Device, creds: Credentials) -> Self {
        let mem = Arc::new(SimUserMemory::new(USER_BASE, USER_SIZE));
        let file = dev
            .open_client(creds, mem.clone() as Arc<dyn UserMemory>)
            .expect("open client");
        Self { file, mem }
    }

    /// Admin, authenticated client; the first one opened is also master.
    pub fn privileged(dev: &Device) -> Self {
        let client = Self::open(
            dev,
            Credentials {
                pid: 100,
                uid: 0,
                admin: true,
            },
        );
        client.file.set_authenticated(true);
        client
    }

    pub fn ptr(&self, offset: u64) -> UserPtr {
        UserPtr(USER_BASE + offset)
    }

    pub fn stage(&self, offset: u64, data: &[u8]) -> UserPtr {
        let ptr = self.ptr(offset);
        self.mem.write(ptr, data).expect("stage user data");
        ptr
    }

    pub fn fetch(&self, offset: u64, len: usize) -> Vec<u8> {
        self.mem.read(self.ptr(offset), len).expect("read user data")
    }
}

/// Writes `id` into a fresh window and submits it through the typed handler.
pub fn set_unique(dev: &Device, id: &str) -> drm_core::Result<()> {
    let mem = SimUserMemory::new(USER_BASE, USER_SIZE);
    mem.write(UserPtr(USER_BASE), id.as_bytes()).unwrap();
    dev.set_unique(UserPtr(USER_BASE), id.len(), &mem)
}

/// Reads the bus id through the probe-then-fetch sequence a client would use.
pub fn get_unique(dev: &Device) -> Vec<u8> {
    let mem = SimUserMemory::new(USER_BASE, USER_SIZE);
    let len = dev.get_unique(0, UserPtr::NULL, &mem).unwrap();
    let got = dev.get_unique(len, UserPtr(USER_BASE), &mem).unwrap();
    assert_eq!(got, len);
    mem.read(UserPtr(USER_BASE), len).unwrap()
}
