//! PCI bus identity types used by the DRM control plane.
//!
//! The bus enumeration subsystem itself lives elsewhere; this crate only models the
//! `(domain, bus, slot, function)` tuple it reports and the two textual bus-id forms clients
//! exchange with the device.

#![forbid(unsafe_code)]

mod bus_id;

pub use bus_id::{
    format_canonical_bus_id, parse_legacy_bus_id, BusIdError, LegacyBusId,
    CANONICAL_BUS_ID_CAPACITY,
};

/// Extracts the slot (device) number from a packed `devfn` byte.
pub const fn pci_slot(devfn: u8) -> u8 {
    (devfn >> 3) & 0x1f
}

/// Extracts the function number from a packed `devfn` byte.
pub const fn pci_func(devfn: u8) -> u8 {
    devfn & 0x07
}

/// Packs a slot/function pair into a `devfn` byte.
///
/// # Panics
///
/// Panics in debug builds if `slot >= 32` or `function >= 8`.
pub const fn pci_devfn(slot: u8, function: u8) -> u8 {
    debug_assert!(slot < 32);
    debug_assert!(function < 8);
    (slot << 3) | function
}

/// Physical location of a PCI function, including its segment (domain).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PciLocation {
    pub domain: u32,
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
}

impl PciLocation {
    /// Creates a new location.
    ///
    /// The caller is responsible for ensuring `slot < 32` and `function < 8`.
    pub const fn new(domain: u32, bus: u8, slot: u8, function: u8) -> Self {
        Self {
            domain,
            bus,
            slot,
            function,
        }
    }

    /// Builds a location from a bus number and a packed `devfn` byte.
    pub const fn from_devfn(domain: u32, bus: u8, devfn: u8) -> Self {
        Self::new(domain, bus, pci_slot(devfn), pci_func(devfn))
    }
}

impl core::fmt::Display for PciLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.domain, self.bus, self.slot, self.function
        )
    }
}

impl core::str::FromStr for PciLocation {
    type Err = BusIdError;

    /// Parses the `DDDD:BB:SS.F` form used by `lspci -D` (all fields hex except the function).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BusIdError::Malformed(s.to_string());

        let (head, function) = s.rsplit_once('.').ok_or_else(malformed)?;
        let mut parts = head.split(':');
        let (Some(domain), Some(bus), Some(slot), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let domain = u32::from_str_radix(domain, 16).map_err(|_| malformed())?;
        let bus = u8::from_str_radix(bus, 16).map_err(|_| malformed())?;
        let slot = u8::from_str_radix(slot, 16).map_err(|_| malformed())?;
        let function = function.parse::<u8>().map_err(|_| malformed())?;
        if slot >= 32 || function >= 8 {
            return Err(malformed());
        }

        Ok(Self::new(domain, bus, slot, function))
    }
}

/// Source of the enumerated bus position for a device.
///
/// Implemented by whatever bus layer attached the device; the control plane only reads it.
pub trait PciTopology: Send + Sync {
    fn location(&self) -> PciLocation;
}

impl PciTopology for PciLocation {
    fn location(&self) -> PciLocation {
        *self
    }
}
