use drm_pci::{
    format_canonical_bus_id, parse_legacy_bus_id, BusIdError, PciLocation,
    CANONICAL_BUS_ID_CAPACITY,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn location() -> impl Strategy<Value = PciLocation> {
    (0u32..=0x7f_ffff, any::<u8>(), 0u8..32, 0u8..8)
        .prop_map(|(domain, bus, slot, function)| PciLocation::new(domain, bus, slot, function))
}

proptest! {
    #[test]
    fn legacy_id_for_location_matches_it(loc in location()) {
        let bus_field = (loc.domain << 8) | u32::from(loc.bus);
        let text = format!("PCI:{}:{}:{}", bus_field, loc.slot, loc.function);

        let id = parse_legacy_bus_id(text.as_bytes()).unwrap();
        prop_assert!(id.matches(loc));
    }

    #[test]
    fn legacy_id_rejects_other_slots(loc in location(), delta in 1u8..32) {
        let other = PciLocation::new(loc.domain, loc.bus, (loc.slot + delta) % 32, loc.function);
        let bus_field = (loc.domain << 8) | u32::from(loc.bus);
        let text = format!("PCI:{}:{}:{}", bus_field, other.slot, other.function);

        let id = parse_legacy_bus_id(text.as_bytes()).unwrap();
        prop_assert!(!id.matches(loc));
    }

    #[test]
    fn text_without_three_fields_is_rejected(s in "[A-Za-z:. ]{0,24}") {
        let err = parse_legacy_bus_id(s.as_bytes()).unwrap_err();
        let is_field_count = matches!(err, BusIdError::FieldCount { .. });
        prop_assert!(is_field_count);
    }

    #[test]
    fn canonical_id_always_fits_capacity(loc in location()) {
        let mut buf = [0u8; CANONICAL_BUS_ID_CAPACITY];
        let len = format_canonical_bus_id(loc, &mut buf);
        prop_assert!(len < CANONICAL_BUS_ID_CAPACITY);
        prop_assert_eq!(buf[len], 0);
        prop_assert!(buf.starts_with(b"pci:"));
    }
}

#[test]
fn canonical_id_for_root_complex_device() {
    let mut buf = [0u8; CANONICAL_BUS_ID_CAPACITY];
    let len = format_canonical_bus_id(PciLocation::new(0, 0, 2, 0), &mut buf);
    assert_eq!(std::str::from_utf8(&buf[..len]).unwrap(), "pci:0000:00:02.0");
}
