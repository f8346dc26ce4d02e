//! Control-plane ioctl dispatch.
//!
//! Each request is a fixed-shape argument updated in place. The dispatcher checks the caller's
//! permissions against the ioctl's flags, does the per-call bookkeeping and forwards to the
//! handler on [`Device`].

use bitflags::bitflags;
use serde::Serialize;

use crate::device::Device;
use crate::driver::DriverVersion;
use crate::error::{DrmError, Result};
use crate::file::DrmFile;
use crate::stats::{StatType, Stats};
use crate::uaccess::{UserMemory, UserPtr};
use crate::version::SetVersion;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IoctlNr {
    Version = 0x00,
    GetUnique = 0x01,
    GetMap = 0x04,
    GetClient = 0x05,
    GetStats = 0x06,
    SetVersion = 0x07,
    SetUnique = 0x10,
    Noop = 0x12,
}

bitflags! {
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct IoctlFlags: u32 {
        /// Caller must be authenticated.
        const AUTH = 1 << 0;
        /// Caller must be the master client.
        const MASTER = 1 << 1;
        /// Caller must hold the administrative capability.
        const ROOT_ONLY = 1 << 2;
    }
}

impl IoctlNr {
    pub const ALL: [IoctlNr; 8] = [
        IoctlNr::Version,
        IoctlNr::GetUnique,
        IoctlNr::GetMap,
        IoctlNr::GetClient,
        IoctlNr::GetStats,
        IoctlNr::SetVersion,
        IoctlNr::SetUnique,
        IoctlNr::Noop,
    ];

    pub fn from_raw(nr: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|&n| n as u32 == nr)
    }

    pub const fn flags(self) -> IoctlFlags {
        match self {
            IoctlNr::SetVersion => IoctlFlags::MASTER.union(IoctlFlags::ROOT_ONLY),
            IoctlNr::SetUnique => IoctlFlags::AUTH
                .union(IoctlFlags::MASTER)
                .union(IoctlFlags::ROOT_ONLY),
            IoctlNr::Version
            | IoctlNr::GetUnique
            | IoctlNr::GetMap
            | IoctlNr::GetClient
            | IoctlNr::GetStats
            | IoctlNr::Noop => IoctlFlags::empty(),
        }
    }
}

/// GetUnique / SetUnique argument.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DrmUnique {
    pub unique_len: usize,
    pub unique: UserPtr,
}

/// GetMap argument. The index travels in `offset` on the way in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DrmMap {
    pub offset: u64,
    pub size: u64,
    pub map_type: u32,
    pub flags: u32,
    pub handle: u64,
    pub mtrr: i32,
}

impl DrmMap {
    pub fn index(index: i32) -> Self {
        Self {
            offset: index as i64 as u64,
            ..Default::default()
        }
    }
}

/// GetClient argument. `idx` is a cursor on the way in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DrmClient {
    pub idx: i32,
    pub auth: bool,
    pub pid: u32,
    pub uid: u32,
    pub magic: u32,
    pub iocs: u64,
}

/// GetVersion argument. Each string is copied up to its capacity; the full length is reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DrmVersion {
    pub version_major: i32,
    pub version_minor: i32,
    pub version_patchlevel: i32,
    pub name_len: usize,
    pub name: UserPtr,
    pub date_len: usize,
    pub date: UserPtr,
    pub desc_len: usize,
    pub desc: UserPtr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoctlArg {
    Version(DrmVersion),
    Unique(DrmUnique),
    Map(DrmMap),
    Client(DrmClient),
    Stats(Stats),
    SetVersion(SetVersion),
    None,
}

impl Device {
    /// Entry point for a client request.
    pub fn ioctl(&self, file: &DrmFile, nr: u32, arg: &mut IoctlArg) -> Result<()> {
        self.counters.inc(StatType::Ioctls);
        file.count_ioctl();

        let Some(ioctl) = IoctlNr::from_raw(nr) else {
            tracing::debug!(pid = file.pid(), nr, "unknown ioctl");
            return Err(DrmError::InvalidArgument("unknown ioctl"));
        };

        tracing::debug!(
            pid = file.pid(),
            ?ioctl,
            auth = file.is_authenticated(),
            "ioctl"
        );

        let flags = ioctl.flags();
        if (flags.contains(IoctlFlags::ROOT_ONLY) && !file.is_admin())
            || (flags.contains(IoctlFlags::AUTH) && !file.is_authenticated())
            || (flags.contains(IoctlFlags::MASTER) && !file.is_master())
        {
            tracing::debug!(pid = file.pid(), ?ioctl, "ioctl permission denied");
            return Err(DrmError::PermissionDenied { nr });
        }

        let result = self.call_ioctl(ioctl, arg, file);
        if let Err(err) = &result {
            tracing::debug!(pid = file.pid(), ?ioctl, errno = err.errno(), "ioctl failed");
        }
        result
    }

    fn call_ioctl(&self, ioctl: IoctlNr, arg: &mut IoctlArg, file: &DrmFile) -> Result<()> {
        let mem = file.user_memory();
        match (ioctl, arg) {
            (IoctlNr::Version, IoctlArg::Version(v)) => self.get_version_ioctl(v, mem),
            (IoctlNr::GetUnique, IoctlArg::Unique(u)) => {
                u.unique_len = self.get_unique(u.unique_len, u.unique, mem)?;
                Ok(())
            }
            (IoctlNr::SetUnique, IoctlArg::Unique(u)) => {
                self.set_unique(u.unique, u.unique_len, mem)
            }
            (IoctlNr::GetMap, IoctlArg::Map(m)) => {
                // Truncation to a C int is how the index has always been read.
                let info = self.get_map(m.offset as i32)?;
                *m = DrmMap {
                    offset: info.offset,
                    size: info.size,
                    map_type: info.map_type as u32,
                    flags: info.flags.bits(),
                    handle: info.handle,
                    mtrr: info.mtrr,
                };
                Ok(())
            }
            (IoctlNr::GetClient, IoctlArg::Client(c)) => {
                let info = self.get_client(c.idx)?;
                c.auth = info.auth;
                c.pid = info.pid;
                c.uid = info.uid;
                c.magic = info.magic;
                c.iocs = info.iocs;
                Ok(())
            }
            (IoctlNr::GetStats, IoctlArg::Stats(s)) => {
                *s = self.get_stats();
                Ok(())
            }
            (IoctlNr::SetVersion, IoctlArg::SetVersion(sv)) => self.set_version(sv),
            (IoctlNr::Noop, _) => {
                tracing::debug!("noop");
                Ok(())
            }
            _ => Err(DrmError::InvalidArgument("argument does not match ioctl")),
        }
    }

    fn get_version_ioctl(&self, v: &mut DrmVersion, mem: &dyn UserMemory) -> Result<()> {
        let DriverVersion {
            major,
            minor,
            patchlevel,
        } = self.driver.version();
        v.version_major = major;
        v.version_minor = minor;
        v.version_patchlevel = patchlevel;

        copy_field(mem, v.name, &mut v.name_len, self.driver.name())?;
        copy_field(mem, v.date, &mut v.date_len, self.driver.date())?;
        copy_field(mem, v.desc, &mut v.desc_len, self.driver.desc())?;
        Ok(())
    }
}

/// Copies as much of `value` as fits in `*buf_len` bytes and reports its full length.
fn copy_field(
    mem: &dyn UserMemory,
    buf: UserPtr,
    buf_len: &mut usize,
    value: &str,
) -> Result<()> {
    let len = value.len().min(*buf_len);
    *buf_len = value.len();
    if len > 0 && !buf.is_null() {
        mem.copy_to_user(buf, &value.as_bytes()[..len])?;
    }
    Ok(())
}
