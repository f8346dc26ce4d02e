//! End-to-end control-plane session: a display server takes the device, a second client
//! inspects it.

use std::sync::Arc;

use drm_core::sis::{SisDriver, SisFamily};
use drm_core::{
    errno, Credentials, Device, DeviceConfig, DrmClient, DrmUnique, IoctlArg, IoctlNr,
    SetVersion, SimUserMemory, StatType, Stats, UserMemory, UserPtr,
};
use drm_pci::{parse_legacy_bus_id, pci_devfn, PciLocation};
use pretty_assertions::assert_eq;

const BASE: u64 = 0x4000_0000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

struct Client {
    file: Arc<drm_core::DrmFile>,
    mem: Arc<SimUserMemory>,
}

fn connect(dev: &Device, pid: u32, admin: bool) -> Client {
    let mem = Arc::new(SimUserMemory::new(BASE, 0x1000));
    let file = dev
        .open_client(
            Credentials {
                pid,
                uid: if admin { 0 } else { 1000 },
                admin,
            },
            mem.clone() as Arc<dyn UserMemory>,
        )
        .unwrap();
    Client { file, mem }
}

fn call(dev: &Device, client: &Client, nr: IoctlNr, arg: &mut IoctlArg) -> drm_core::Result<()> {
    dev.ioctl(&client.file, nr as u32, arg)
}

#[test]
fn display_server_claims_device_and_others_observe_it() {
    init_tracing();

    let location = PciLocation::from_devfn(0, 0, pci_devfn(2, 0));
    let dev = Device::new(
        Arc::new(SisDriver::new(SisFamily::Chip315)),
        Arc::new(location),
        DeviceConfig::default(),
    );

    let server = connect(&dev, 500, true);
    server.file.set_authenticated(true);
    let viewer = connect(&dev, 600, false);

    // The server negotiates the legacy interface and then names the device itself.
    let mut arg = IoctlArg::SetVersion(SetVersion::interface(1, 0));
    call(&dev, &server, IoctlNr::SetVersion, &mut arg).unwrap();

    let id = b"PCI:0:2:0";
    assert!(parse_legacy_bus_id(id).unwrap().matches(location));
    server.mem.write(UserPtr(BASE), id).unwrap();
    let mut arg = IoctlArg::Unique(DrmUnique {
        unique_len: id.len(),
        unique: UserPtr(BASE),
    });
    call(&dev, &server, IoctlNr::SetUnique, &mut arg).unwrap();

    // The viewer may read but not rename.
    let err = call(&dev, &viewer, IoctlNr::SetUnique, &mut arg).unwrap_err();
    assert_eq!(err.errno(), errno::EACCES);

    let mut arg = IoctlArg::Unique(DrmUnique {
        unique_len: 64,
        unique: UserPtr(BASE + 0x100),
    });
    call(&dev, &viewer, IoctlNr::GetUnique, &mut arg).unwrap();
    assert_eq!(
        arg,
        IoctlArg::Unique(DrmUnique {
            unique_len: id.len(),
            unique: UserPtr(BASE + 0x100),
        })
    );
    assert_eq!(viewer.mem.read(UserPtr(BASE + 0x100), id.len()).unwrap(), id);
    assert_eq!(dev.display_name().as_deref(), Some("sis@PCI:0:2:0"));

    // Enumerate clients until the cursor runs off the end.
    let mut pids = Vec::new();
    for idx in 0.. {
        let mut arg = IoctlArg::Client(DrmClient {
            idx,
            ..Default::default()
        });
        match call(&dev, &viewer, IoctlNr::GetClient, &mut arg) {
            Ok(()) => {
                let IoctlArg::Client(c) = arg else {
                    unreachable!()
                };
                pids.push((c.pid, c.auth));
            }
            Err(err) => {
                assert_eq!(err.errno(), errno::EINVAL);
                break;
            }
        }
    }
    assert_eq!(pids, vec![(500, true), (600, false)]);

    let mut arg = IoctlArg::Stats(Stats::default());
    call(&dev, &viewer, IoctlNr::GetStats, &mut arg).unwrap();
    let IoctlArg::Stats(stats) = arg else {
        unreachable!()
    };
    assert_eq!(stats.value_of(StatType::Opens), Some(2));
    // SetVersion, SetUnique, rejected SetUnique, GetUnique, three GetClient, GetStats.
    assert_eq!(stats.value_of(StatType::Ioctls), Some(8));

    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["data"][1]["type"], "opens");

    assert!(dev.close_client(&server.file));
    assert_eq!(dev.get_stats().value_of(StatType::Closes), Some(1));
}
