use thiserror::Error;

use crate::uaccess::Fault;

pub type Result<T> = std::result::Result<T, DrmError>;

/// Errno values reported across the ioctl ABI; callers negate them.
pub mod errno {
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EFAULT: i32 = 14;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrmError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("device bus id is already set")]
    AlreadySet,

    #[error("no entry at or after index {index}")]
    NotFound { index: i64 },

    #[error("out of memory allocating {len} bytes")]
    ResourceExhausted { len: usize },

    #[error("user memory fault: {0}")]
    BoundaryTransfer(#[from] Fault),

    #[error("permission denied for ioctl {nr:#04x}")]
    PermissionDenied { nr: u32 },
}

impl DrmError {
    /// Errno reported to ABI callers (always positive; callers negate it).
    ///
    /// Lookups that find nothing report `EINVAL`, which is what clients of the ioctl interface
    /// have always observed for a bad map or client index.
    pub fn errno(&self) -> i32 {
        match self {
            DrmError::InvalidArgument(_) | DrmError::NotFound { .. } => errno::EINVAL,
            DrmError::AlreadySet => errno::EBUSY,
            DrmError::ResourceExhausted { .. } => errno::ENOMEM,
            DrmError::BoundaryTransfer(_) => errno::EFAULT,
            DrmError::PermissionDenied { .. } => errno::EACCES,
        }
    }
}

/// Allocates a zeroed buffer, surfacing allocation failure instead of aborting.
pub(crate) fn alloc_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| DrmError::ResourceExhausted { len })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Makes room for one more registry entry.
pub(crate) fn alloc_slot<T>(list: &mut Vec<T>) -> Result<()> {
    list.try_reserve(1)
        .map_err(|_| DrmError::ResourceExhausted {
            len: core::mem::size_of::<T>(),
        })
}
