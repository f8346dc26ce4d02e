mod common;

use std::sync::Arc;

use common::{device_at, TestClient};
use drm_core::stats::{LOCK_HELD, StatEntry};
use drm_core::{
    ClientInfo, Credentials, Device, DeviceConfig, DrmError, HwLock, LocalMap, MapFlags, MapInfo,
    MapListEntry, MapType, PciLocation, StatType, MAX_COUNTERS,
};
use pretty_assertions::assert_eq;

fn dev() -> Device {
    device_at(PciLocation::new(0, 1, 0, 0))
}

fn fb_map() -> LocalMap {
    LocalMap {
        offset: 0xe000_0000,
        size: 0x0100_0000,
        map_type: MapType::FrameBuffer,
        flags: MapFlags::WRITE_COMBINING,
        mtrr: 1,
    }
}

fn reg_map() -> LocalMap {
    LocalMap {
        offset: 0xfeb0_0000,
        size: 0x1_0000,
        map_type: MapType::Registers,
        flags: MapFlags::READ_ONLY | MapFlags::KERNEL,
        mtrr: -1,
    }
}

#[test]
fn get_map_returns_entry_at_exact_position() {
    let dev = dev();
    dev.add_map(MapListEntry::new(fb_map(), 0x1000)).unwrap();
    dev.add_map(MapListEntry::new(reg_map(), 0x2000)).unwrap();

    assert_eq!(
        dev.get_map(1).unwrap(),
        MapInfo {
            offset: 0xfeb0_0000,
            size: 0x1_0000,
            map_type: MapType::Registers,
            flags: MapFlags::READ_ONLY | MapFlags::KERNEL,
            handle: 0x2000,
            mtrr: -1,
        }
    );
    assert_eq!(dev.get_map(0).unwrap().handle, 0x1000);
}

#[test]
fn get_map_one_past_end_and_negative_fail() {
    let dev = dev();
    assert_eq!(dev.get_map(0), Err(DrmError::NotFound { index: 0 }));

    dev.add_map(MapListEntry::new(fb_map(), 0x1000)).unwrap();
    let count = dev.map_count() as i32;
    assert_eq!(dev.get_map(count), Err(DrmError::NotFound { index: 1 }));
    assert!(matches!(
        dev.get_map(-1),
        Err(DrmError::InvalidArgument(_))
    ));
}

#[test]
fn unbacked_entry_is_invalid() {
    let dev = dev();
    dev.add_map(MapListEntry::unbacked(0x3000)).unwrap();
    dev.add_map(MapListEntry::new(fb_map(), 0x1000)).unwrap();

    assert!(matches!(dev.get_map(0), Err(DrmError::InvalidArgument(_))));
    assert_eq!(dev.get_map(1).unwrap().handle, 0x1000);
}

#[test]
fn removal_shifts_positions() {
    let dev = dev();
    dev.add_map(MapListEntry::new(fb_map(), 0x1000)).unwrap();
    dev.add_map(MapListEntry::new(reg_map(), 0x2000)).unwrap();

    assert!(dev.remove_map(0x1000));
    assert!(!dev.remove_map(0x1000));
    assert_eq!(dev.get_map(0).unwrap().map_type, MapType::Registers);
    assert!(dev.get_map(1).is_err());
}

#[test]
fn get_client_on_empty_registry_fails() {
    let dev = dev();
    assert_eq!(dev.get_client(0), Err(DrmError::NotFound { index: 0 }));
}

#[test]
fn get_client_reports_connected_record() {
    let dev = dev();
    let client = TestClient::open(
        &dev,
        Credentials {
            pid: 42,
            uid: 1000,
            admin: false,
        },
    );
    client.file.set_magic(0xbeef);

    assert_eq!(
        dev.get_client(0).unwrap(),
        ClientInfo {
            auth: false,
            pid: 42,
            uid: 1000,
            magic: 0xbeef,
            iocs: 0,
        }
    );
    assert!(client.file.is_master());
}

#[test]
fn get_client_cursor_skips_forward_after_disconnect() {
    let dev = dev();
    let clients: Vec<_> = (0..3)
        .map(|pid| {
            TestClient::open(
                &dev,
                Credentials {
                    pid,
                    ..Default::default()
                },
            )
        })
        .collect();

    assert_eq!(dev.get_client(1).unwrap().pid, 1);
    assert!(dev.close_client(&clients[1].file));
    assert!(!dev.close_client(&clients[1].file));

    // Cursor 1 now lands on the client that used to be at position 2.
    assert_eq!(dev.get_client(1).unwrap().pid, 2);
    assert!(dev.get_client(2).is_err());
    // Negative cursors start from the front.
    assert_eq!(dev.get_client(-5).unwrap().pid, 0);
    assert!(!clients[2].file.is_master());
}

#[test]
fn fresh_device_stats_are_zero() {
    let cfg = DeviceConfig::with_extra_counters([StatType::Irq, StatType::Dma]).unwrap();
    let dev = Device::new(
        Arc::new(drm_core::sis::SisDriver::default()),
        Arc::new(PciLocation::new(0, 1, 0, 0)),
        cfg,
    );

    let stats = dev.get_stats();
    assert_eq!(stats.count, 8);
    assert!(stats.data.iter().all(|e| e.value == 0));
    assert_eq!(stats.data[7].ty, StatType::Dma);
    assert_eq!(stats.data[8], StatEntry::default());
}

#[test]
fn stats_track_opens_closes_and_lock_word() {
    let dev = dev();
    let a = TestClient::privileged(&dev);
    let _b = TestClient::privileged(&dev);
    dev.close_client(&a.file);

    let lock = Arc::new(HwLock::new());
    assert!(lock.try_take(7));
    dev.install_hw_lock(lock.clone());

    let stats = dev.get_stats();
    assert_eq!(stats.count, 6);
    assert_eq!(stats.value_of(StatType::Opens), Some(2));
    assert_eq!(stats.value_of(StatType::Closes), Some(1));
    assert_eq!(stats.value_of(StatType::Lock), Some(u64::from(LOCK_HELD | 7)));

    dev.remove_hw_lock();
    assert_eq!(dev.get_stats().value_of(StatType::Lock), Some(0));
    assert!(stats.count <= MAX_COUNTERS);
}

#[test]
fn stats_serialize_with_type_names() {
    let dev = dev();
    dev.counters().add(StatType::Ioctls, 3);
    let json = serde_json::to_value(dev.get_stats()).unwrap();
    assert_eq!(json["count"], 6);
    assert_eq!(json["data"][3]["type"], "ioctls");
    assert_eq!(json["data"][3]["value"], 3);
}
