//! Boundary transfers between a client's address space and the device.
//!
//! The real copy primitive belongs to whoever hosts the device; handlers only see the
//! [`UserMemory`] trait and its distinguishable [`Fault`].

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

/// Address in a client's address space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct UserPtr(pub u64);

impl UserPtr {
    pub const NULL: UserPtr = UserPtr(0);

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{len} bytes at {addr:#x} are not accessible")]
pub struct Fault {
    pub addr: u64,
    pub len: usize,
}

pub trait UserMemory: Send + Sync {
    /// Fills `dst` from the client buffer at `src`.
    fn copy_from_user(&self, dst: &mut [u8], src: UserPtr) -> Result<(), Fault>;

    /// Writes `src` into the client buffer at `dst`.
    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> Result<(), Fault>;
}

/// Flat address window backed by host memory.
///
/// Addresses in `[base, base + size)` are accessible; anything else faults, including the null
/// page when `base` is non-zero. Zero-length transfers never fault.
#[derive(Debug)]
pub struct SimUserMemory {
    base: u64,
    bytes: Mutex<Vec<u8>>,
}

impl SimUserMemory {
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            bytes: Mutex::new(vec![0; size]),
        }
    }

    pub fn base(&self) -> UserPtr {
        UserPtr(self.base)
    }

    fn range(
        &self,
        addr: UserPtr,
        len: usize,
        size: usize,
    ) -> Result<core::ops::Range<usize>, Fault> {
        if len == 0 {
            return Ok(0..0);
        }
        let fault = Fault { addr: addr.0, len };
        let start = addr.0.checked_sub(self.base).ok_or(fault)?;
        let start = usize::try_from(start).map_err(|_| fault)?;
        let end = start.checked_add(len).ok_or(fault)?;
        if end > size {
            return Err(fault);
        }
        Ok(start..end)
    }

    /// Host-side helper for staging request payloads.
    pub fn write(&self, addr: UserPtr, data: &[u8]) -> Result<(), Fault> {
        self.copy_to_user(addr, data)
    }

    /// Host-side helper for inspecting response payloads.
    pub fn read(&self, addr: UserPtr, len: usize) -> Result<Vec<u8>, Fault> {
        let mut out = vec![0; len];
        self.copy_from_user(&mut out, addr)?;
        Ok(out)
    }
}

impl UserMemory for SimUserMemory {
    fn copy_from_user(&self, dst: &mut [u8], src: UserPtr) -> Result<(), Fault> {
        let bytes = self
            .bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let range = self.range(src, dst.len(), bytes.len())?;
        dst.copy_from_slice(&bytes[range]);
        Ok(())
    }

    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> Result<(), Fault> {
        let mut bytes = self
            .bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let len = bytes.len();
        let range = self.range(dst, src.len(), len)?;
        bytes[range].copy_from_slice(src);
        Ok(())
    }
}
