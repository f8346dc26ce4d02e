//! Textual bus-id forms.
//!
//! Two spellings exist:
//! - the legacy client-supplied form `PCI:<bus>:<slot>:<function>` (decimal, where the first field
//!   carries the domain in its upper bits), and
//! - the canonical device-generated form `pci:DDDD:BB:SS.F` (hex).

use thiserror::Error;

use crate::PciLocation;

/// Size of the buffer the canonical bus id is formatted into, including the NUL terminator.
pub const CANONICAL_BUS_ID_CAPACITY: usize = 40;

const LEGACY_PREFIX: &[u8] = b"PCI:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusIdError {
    #[error("bus id yielded {parsed} of 3 integer fields")]
    FieldCount { parsed: usize },

    #[error("malformed PCI location {0:?}")]
    Malformed(String),
}

/// Parsed `PCI:<bus>:<slot>:<function>` triple, kept as the raw signed integers the client sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LegacyBusId {
    pub bus_field: i32,
    pub slot: i32,
    pub function: i32,
}

impl LegacyBusId {
    /// Domain encoded in the high bits of the first field.
    pub const fn domain(self) -> i32 {
        self.bus_field >> 8
    }

    /// Bus number encoded in the low byte of the first field.
    pub const fn bus(self) -> i32 {
        self.bus_field & 0xff
    }

    /// Returns true when every component equals the enumerated location.
    pub fn matches(self, loc: PciLocation) -> bool {
        i64::from(self.domain()) == i64::from(loc.domain)
            && self.bus() == i32::from(loc.bus)
            && self.slot == i32::from(loc.slot)
            && self.function == i32::from(loc.function)
    }
}

/// Parses a legacy bus id with `sscanf("PCI:%d:%d:%d")` semantics.
///
/// Each integer may be preceded by whitespace and a sign. Anything after the third integer is
/// ignored. Out-of-range integers count as unparsed.
pub fn parse_legacy_bus_id(input: &[u8]) -> Result<LegacyBusId, BusIdError> {
    let Some(mut rest) = input.strip_prefix(LEGACY_PREFIX) else {
        return Err(BusIdError::FieldCount { parsed: 0 });
    };

    let mut fields = [0i32; 3];
    for (i, field) in fields.iter_mut().enumerate() {
        if i > 0 {
            rest = rest
                .strip_prefix(b":")
                .ok_or(BusIdError::FieldCount { parsed: i })?;
        }
        let (value, tail) = scan_decimal(rest).ok_or(BusIdError::FieldCount { parsed: i })?;
        *field = value;
        rest = tail;
    }

    Ok(LegacyBusId {
        bus_field: fields[0],
        slot: fields[1],
        function: fields[2],
    })
}

fn scan_decimal(input: &[u8]) -> Option<(i32, &[u8])> {
    let start = input
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r'))?;
    let mut rest = &input[start..];

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let mut value: i64 = 0;
    for &d in &rest[..digits] {
        value = value.checked_mul(10)?.checked_add(i64::from(d - b'0'))?;
        if value > i64::from(i32::MAX) + 1 {
            return None;
        }
    }
    let value = if negative { -value } else { value };
    let value = i32::try_from(value).ok()?;

    Some((value, &rest[digits..]))
}

/// Formats `pci:DDDD:BB:SS.F` into `buf` with `snprintf` semantics.
///
/// At most `buf.len() - 1` characters are written, followed by a NUL; the remainder of `buf` is
/// left untouched. Returns the length the full string would have had, so callers can detect
/// truncation by comparing it against `buf.len()`.
pub fn format_canonical_bus_id(loc: PciLocation, buf: &mut [u8]) -> usize {
    let text = format!(
        "pci:{:04x}:{:02x}:{:02x}.{}",
        loc.domain, loc.bus, loc.slot, loc.function
    );
    if let Some(room) = buf.len().checked_sub(1) {
        let n = text.len().min(room);
        buf[..n].copy_from_slice(&text.as_bytes()[..n]);
        buf[n] = 0;
    }
    text.len()
}
