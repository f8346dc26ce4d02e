//! Performance counter bank.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

use crate::config::ConfigError;

/// Number of counter slots in a stats response.
pub const MAX_COUNTERS: usize = 15;

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    /// Live hardware lock word rather than an accumulated count.
    #[default]
    Lock = 0,
    Opens = 1,
    Closes = 2,
    Ioctls = 3,
    Locks = 4,
    Unlocks = 5,
    Value = 6,
    Byte = 7,
    Count = 8,
    Irq = 9,
    Primary = 10,
    Secondary = 11,
    Dma = 12,
    Special = 13,
    Missed = 14,
}

impl StatType {
    /// Counters every device carries, in slot order.
    pub const CORE: [StatType; 6] = [
        StatType::Lock,
        StatType::Opens,
        StatType::Closes,
        StatType::Ioctls,
        StatType::Locks,
        StatType::Unlocks,
    ];

    const ALL: [(StatType, &'static str); MAX_COUNTERS] = [
        (StatType::Lock, "lock"),
        (StatType::Opens, "opens"),
        (StatType::Closes, "closes"),
        (StatType::Ioctls, "ioctls"),
        (StatType::Locks, "locks"),
        (StatType::Unlocks, "unlocks"),
        (StatType::Value, "value"),
        (StatType::Byte, "byte"),
        (StatType::Count, "count"),
        (StatType::Irq, "irq"),
        (StatType::Primary, "primary"),
        (StatType::Secondary, "secondary"),
        (StatType::Dma, "dma"),
        (StatType::Special, "special"),
        (StatType::Missed, "missed"),
    ];

    pub fn name(self) -> &'static str {
        Self::ALL[self as usize].1
    }
}

impl core::str::FromStr for StatType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(ty, _)| *ty)
            .ok_or_else(|| ConfigError::UnknownCounter(s.to_string()))
    }
}

/// `_DRM_LOCK_HELD`: the lock word is owned by the context in the low bits.
pub const LOCK_HELD: u32 = 0x8000_0000;
/// `_DRM_LOCK_CONT`: another context is waiting for the lock.
pub const LOCK_CONT: u32 = 0x4000_0000;

/// Hardware lock word shared with clients.
///
/// Installed and driven by the lock ioctls; the counter bank only reads it.
#[derive(Debug, Default)]
pub struct HwLock {
    word: AtomicU32,
}

impl HwLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn word(&self) -> u32 {
        self.word.load(Ordering::Acquire)
    }

    /// Attempts to take the free lock for `context`.
    pub fn try_take(&self, context: u32) -> bool {
        self.word
            .compare_exchange(
                0,
                LOCK_HELD | context,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Marks the lock as contended while keeping the current owner.
    pub fn mark_contended(&self) {
        self.word.fetch_or(LOCK_CONT, Ordering::AcqRel);
    }

    /// Releases the lock if `context` owns it.
    pub fn free(&self, context: u32) -> bool {
        let cur = self.word.load(Ordering::Acquire);
        if cur & LOCK_HELD == 0 || cur & !(LOCK_HELD | LOCK_CONT) != context {
            return false;
        }
        self.word
            .compare_exchange(cur, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Configured counter slots plus their accumulated values.
///
/// Slot kinds are fixed when the device is created; values are atomics so dispatch bookkeeping
/// never needs the device lock.
#[derive(Debug)]
pub struct Counters {
    types: Vec<StatType>,
    counts: [AtomicU64; MAX_COUNTERS],
}

impl Counters {
    pub(crate) fn new(types: Vec<StatType>) -> Self {
        debug_assert!(types.len() <= MAX_COUNTERS);
        Self {
            types,
            counts: Default::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> &[StatType] {
        &self.types
    }

    /// Bumps the first slot of kind `ty`; no-op if the kind is not configured.
    pub fn inc(&self, ty: StatType) {
        self.add(ty, 1);
    }

    pub fn add(&self, ty: StatType, n: u64) {
        if let Some(slot) = self.types.iter().position(|&t| t == ty) {
            self.counts[slot].fetch_add(n, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self, hw_lock: Option<&HwLock>) -> Stats {
        let mut stats = Stats::default();
        for (i, &ty) in self.types.iter().enumerate() {
            let value = if ty == StatType::Lock {
                hw_lock.map_or(0, |lock| u64::from(lock.word()))
            } else {
                self.counts[i].load(Ordering::Relaxed)
            };
            stats.data[i] = StatEntry { value, ty };
        }
        stats.count = self.types.len();
        stats
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    pub value: u64,
    #[serde(rename = "type")]
    pub ty: StatType,
}

/// Stats response: `count` leading slots are meaningful, the rest stay zeroed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub count: usize,
    pub data: [StatEntry; MAX_COUNTERS],
}

impl Stats {
    pub fn active(&self) -> &[StatEntry] {
        &self.data[..self.count]
    }

    pub fn value_of(&self, ty: StatType) -> Option<u64> {
        self.active().iter().find(|e| e.ty == ty).map(|e| e.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_names_parse_case_insensitively() {
        assert_eq!(" IRQ ".parse::<StatType>().unwrap(), StatType::Irq);
        assert_eq!("missed".parse::<StatType>().unwrap(), StatType::Missed);
        assert!("bogus".parse::<StatType>().is_err());
        for (ty, name) in StatType::ALL {
            assert_eq!(ty.name(), name);
        }
    }

    #[test]
    fn lock_slot_reads_live_word() {
        let counters = Counters::new(StatType::CORE.to_vec());
        counters.inc(StatType::Ioctls);
        counters.add(StatType::Dma, 5);

        let stats = counters.snapshot(None);
        assert_eq!(stats.count, 6);
        assert_eq!(stats.value_of(StatType::Lock), Some(0));
        assert_eq!(stats.value_of(StatType::Ioctls), Some(1));
        assert_eq!(stats.value_of(StatType::Dma), None);

        let lock = HwLock::new();
        assert!(lock.try_take(3));
        assert!(!lock.try_take(4));
        lock.mark_contended();
        let stats = counters.snapshot(Some(&lock));
        assert_eq!(
            stats.value_of(StatType::Lock),
            Some(u64::from(LOCK_HELD | LOCK_CONT | 3))
        );

        assert!(!lock.free(4));
        assert!(lock.free(3));
        assert_eq!(lock.word(), 0);
    }

    #[test]
    fn unused_slots_stay_zeroed() {
        let counters = Counters::new(vec![StatType::Lock, StatType::Irq]);
        counters.inc(StatType::Irq);
        let stats = counters.snapshot(None);
        assert_eq!(stats.active().len(), 2);
        assert!(stats.data[2..].iter().all(|e| *e == StatEntry::default()));
    }
}
