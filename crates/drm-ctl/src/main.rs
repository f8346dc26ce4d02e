#![forbid(unsafe_code)]

//! Drives a simulated DRM device through its control-plane ioctls.
//!
//! Each positional argument is one request, issued in order by a single client. Every request
//! prints one JSON line on stdout; device errors are reported in the record, host failures abort.

use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use drm_core::sis::{SisDriver, SisFamily};
use drm_core::{
    Credentials, Device, DeviceConfig, DrmClient, DrmError, DrmFile, DrmMap, DrmUnique,
    DrmVersion, IoctlArg, IoctlNr, LocalMap, MapFlags, MapListEntry, MapType, PciLocation,
    SetVersion, SimUserMemory, Stats, UserMemory, UserPtr, VERSION_NOT_REQUESTED,
};
use serde_json::{json, Value};

/// Start of the simulated client address window.
const USER_BASE: u64 = 0x1000_0000;
const USER_SIZE: usize = 0x1_0000;
/// Capacity of each string buffer handed to the device.
const STRING_CAPACITY: usize = 0x400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Family {
    Other,
    Chip315,
}

impl From<Family> for SisFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Other => SisFamily::Other,
            Family::Chip315 => SisFamily::Chip315,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "drmctl",
    about = "Issue control-plane requests against a simulated SiS DRM device"
)]
struct Args {
    /// PCI location of the device (`DDDD:BB:SS.F`).
    #[arg(long, default_value = "0000:01:00.0")]
    location: PciLocation,

    /// SiS chip family the driver is bound for; reported by the `version` request.
    #[arg(long, value_enum, default_value_t = Family::Other)]
    family: Family,

    /// Extra counters after the core six (comma separated).
    ///
    /// Overrides `DRM_STAT_COUNTERS` when given.
    #[arg(long)]
    counters: Option<String>,

    /// Register a mapping before any request runs (`TYPE:OFFSET:SIZE`, repeatable).
    #[arg(long = "map", value_name = "TYPE:OFFSET:SIZE")]
    maps: Vec<MapSpec>,

    /// Open the client without the administrative capability or authentication.
    #[arg(long)]
    unprivileged: bool,

    /// Requests: version, get-unique, set-unique=ID, set-version=IF[,DRV], get-map=N,
    /// get-client=N, stats, noop. Versions are `MAJOR.MINOR` or `-`.
    #[arg(required = true, value_name = "REQUEST")]
    steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    Version,
    GetUnique,
    SetUnique(String),
    SetVersion(SetVersion),
    GetMap(i32),
    GetClient(i32),
    Stats,
    Noop,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Version => "version",
            Step::GetUnique => "get-unique",
            Step::SetUnique(_) => "set-unique",
            Step::SetVersion(_) => "set-version",
            Step::GetMap(_) => "get-map",
            Step::GetClient(_) => "get-client",
            Step::Stats => "stats",
            Step::Noop => "noop",
        }
    }
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (op, arg) = match s.split_once('=') {
            Some((op, arg)) => (op, Some(arg)),
            None => (s, None),
        };
        let step = match (op, arg) {
            ("version", None) => Step::Version,
            ("get-unique", None) => Step::GetUnique,
            ("set-unique", Some(id)) => Step::SetUnique(id.to_owned()),
            ("set-version", Some(v)) => Step::SetVersion(parse_set_version(v)?),
            ("get-map", Some(i)) => {
                Step::GetMap(i.parse().with_context(|| format!("invalid map index {i:?}"))?)
            }
            ("get-client", Some(i)) => {
                Step::GetClient(i.parse().with_context(|| format!("invalid client index {i:?}"))?)
            }
            ("stats", None) => Step::Stats,
            ("noop", None) => Step::Noop,
            _ => bail!("unknown request {s:?}"),
        };
        Ok(step)
    }
}

fn parse_version_pair(s: &str) -> Result<(i32, i32)> {
    if s == "-" {
        return Ok((VERSION_NOT_REQUESTED, VERSION_NOT_REQUESTED));
    }
    let (major, minor) = s
        .split_once('.')
        .ok_or_else(|| anyhow!("expected MAJOR.MINOR, got {s:?}"))?;
    Ok((
        major.parse().context("invalid major version")?,
        minor.parse().context("invalid minor version")?,
    ))
}

fn parse_set_version(s: &str) -> Result<SetVersion> {
    let (interface, driver) = s.split_once(',').unwrap_or((s, "-"));
    let (di_major, di_minor) = parse_version_pair(interface)?;
    let (dd_major, dd_minor) = parse_version_pair(driver)?;
    Ok(SetVersion {
        di_major,
        di_minor,
        dd_major,
        dd_minor,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MapSpec {
    map_type: MapType,
    offset: u64,
    size: u64,
}

impl FromStr for MapSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let (Some(ty), Some(offset), Some(size), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            bail!("expected TYPE:OFFSET:SIZE, got {s:?}");
        };
        Ok(Self {
            map_type: parse_map_type(ty)?,
            offset: parse_u64(offset)?,
            size: parse_u64(size)?,
        })
    }
}

fn parse_map_type(s: &str) -> Result<MapType> {
    Ok(match s {
        "fb" | "frame-buffer" => MapType::FrameBuffer,
        "reg" | "registers" => MapType::Registers,
        "shm" => MapType::Shm,
        "agp" => MapType::Agp,
        "sg" | "scatter-gather" => MapType::ScatterGather,
        "consistent" => MapType::Consistent,
        _ => bail!("unknown map type {s:?}"),
    })
}

fn parse_u64(s: &str) -> Result<u64> {
    match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .with_context(|| format!("invalid number {s:?}"))
}

/// One device with one connected client.
struct Session {
    dev: Device,
    family: SisFamily,
    file: Arc<DrmFile>,
    mem: Arc<SimUserMemory>,
}

impl Session {
    fn new(args: &Args) -> Result<Self> {
        let config = match &args.counters {
            Some(raw) => DeviceConfig::parse_counters(raw),
            None => DeviceConfig::from_env(),
        }
        .context("invalid counter configuration")?;

        let driver = SisDriver::new(args.family.into());
        let family = driver.family();
        let dev = Device::new(Arc::new(driver), Arc::new(args.location), config);
        tracing::debug!(?family, "sis driver bound");

        for spec in &args.maps {
            let map = LocalMap {
                offset: spec.offset,
                size: spec.size,
                map_type: spec.map_type,
                flags: MapFlags::empty(),
                mtrr: -1,
            };
            dev.add_map(MapListEntry::new(map, spec.offset))
                .with_context(|| format!("failed to register map at {:#x}", spec.offset))?;
        }

        let mem = Arc::new(SimUserMemory::new(USER_BASE, USER_SIZE));
        let creds = Credentials {
            pid: std::process::id(),
            uid: 0,
            admin: !args.unprivileged,
        };
        let file = dev
            .open_client(creds, mem.clone() as Arc<dyn UserMemory>)
            .context("failed to open client")?;
        file.set_authenticated(!args.unprivileged);

        Ok(Self {
            dev,
            family,
            file,
            mem,
        })
    }

    fn ptr(&self, offset: usize) -> UserPtr {
        UserPtr(USER_BASE + offset as u64)
    }

    fn ioctl(&self, nr: IoctlNr, arg: &mut IoctlArg) -> drm_core::Result<()> {
        self.dev.ioctl(&self.file, nr as u32, arg)
    }

    /// Reads back a NUL-padded string the device wrote into the client window.
    fn read_string(&self, ptr: UserPtr, len: usize) -> Result<String> {
        let bytes = self.mem.read(ptr, len.min(STRING_CAPACITY))?;
        Ok(String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .to_owned())
    }

    /// Issues one request. Device errors become part of the record.
    fn run(&self, step: &Step) -> Result<Value> {
        let result = match step {
            Step::Version => self.version(),
            Step::GetUnique => self.get_unique(),
            Step::SetUnique(id) => self.set_unique(id),
            Step::SetVersion(sv) => self.set_version(*sv),
            Step::GetMap(index) => self.get_map(*index),
            Step::GetClient(cursor) => self.get_client(*cursor),
            Step::Stats => self.stats(),
            Step::Noop => self
                .ioctl(IoctlNr::Noop, &mut IoctlArg::None)
                .map(|()| Value::Null)
                .map_err(Into::into),
        };

        match result {
            Ok(value) => Ok(json!({ "op": step.name(), "ok": true, "result": value })),
            Err(err) => match err.downcast_ref::<DrmError>() {
                Some(dev_err) => {
                    tracing::debug!(op = step.name(), %dev_err, "request failed");
                    Ok(json!({
                        "op": step.name(),
                        "ok": false,
                        "errno": dev_err.errno(),
                        "error": dev_err.to_string(),
                    }))
                }
                None => Err(err.context(format!("{} failed", step.name()))),
            },
        }
    }

    fn version(&self) -> Result<Value> {
        let mut arg = IoctlArg::Version(DrmVersion {
            name_len: STRING_CAPACITY,
            name: self.ptr(0),
            date_len: STRING_CAPACITY,
            date: self.ptr(STRING_CAPACITY),
            desc_len: STRING_CAPACITY,
            desc: self.ptr(2 * STRING_CAPACITY),
            ..Default::default()
        });
        self.ioctl(IoctlNr::Version, &mut arg)?;
        let IoctlArg::Version(v) = arg else {
            bail!("version argument changed kind");
        };
        Ok(json!({
            "major": v.version_major,
            "minor": v.version_minor,
            "patchlevel": v.version_patchlevel,
            "name": self.read_string(v.name, v.name_len)?,
            "date": self.read_string(v.date, v.date_len)?,
            "desc": self.read_string(v.desc, v.desc_len)?,
            "family": self.family,
        }))
    }

    fn get_unique(&self) -> Result<Value> {
        let mut arg = IoctlArg::Unique(DrmUnique::default());
        self.ioctl(IoctlNr::GetUnique, &mut arg)?;
        let IoctlArg::Unique(probe) = arg else {
            bail!("unique argument changed kind");
        };
        if probe.unique_len == 0 {
            return Ok(json!({ "len": 0, "unique": null }));
        }

        let mut arg = IoctlArg::Unique(DrmUnique {
            unique_len: probe.unique_len,
            unique: self.ptr(0),
        });
        self.ioctl(IoctlNr::GetUnique, &mut arg)?;
        let IoctlArg::Unique(u) = arg else {
            bail!("unique argument changed kind");
        };
        Ok(json!({
            "len": u.unique_len,
            "unique": self.read_string(u.unique, u.unique_len)?,
        }))
    }

    fn set_unique(&self, id: &str) -> Result<Value> {
        let ptr = self.ptr(0);
        self.mem
            .write(ptr, id.as_bytes())
            .context("bus id does not fit the client window")?;
        let mut arg = IoctlArg::Unique(DrmUnique {
            unique_len: id.len(),
            unique: ptr,
        });
        self.ioctl(IoctlNr::SetUnique, &mut arg)?;
        Ok(json!({ "unique": id }))
    }

    fn set_version(&self, sv: SetVersion) -> Result<Value> {
        let mut arg = IoctlArg::SetVersion(sv);
        self.ioctl(IoctlNr::SetVersion, &mut arg)?;
        let IoctlArg::SetVersion(sv) = arg else {
            bail!("version argument changed kind");
        };
        Ok(serde_json::to_value(sv)?)
    }

    fn get_map(&self, index: i32) -> Result<Value> {
        let mut arg = IoctlArg::Map(DrmMap::index(index));
        self.ioctl(IoctlNr::GetMap, &mut arg)?;
        let IoctlArg::Map(map) = arg else {
            bail!("map argument changed kind");
        };
        Ok(serde_json::to_value(map)?)
    }

    fn get_client(&self, cursor: i32) -> Result<Value> {
        let mut arg = IoctlArg::Client(DrmClient {
            idx: cursor,
            ..Default::default()
        });
        self.ioctl(IoctlNr::GetClient, &mut arg)?;
        let IoctlArg::Client(client) = arg else {
            bail!("client argument changed kind");
        };
        Ok(serde_json::to_value(client)?)
    }

    fn stats(&self) -> Result<Value> {
        let mut arg = IoctlArg::Stats(Stats::default());
        self.ioctl(IoctlNr::GetStats, &mut arg)?;
        let IoctlArg::Stats(stats) = arg else {
            bail!("stats argument changed kind");
        };
        Ok(json!({ "count": stats.count, "data": stats.active() }))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let session = Session::new(&args)?;
    tracing::info!(location = %args.location, requests = args.steps.len(), "device ready");

    let mut out = io::stdout().lock();
    for step in &args.steps {
        let record = session.run(step)?;
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
    }
    Ok(())
}
