use thiserror::Error;

use crate::stats::{StatType, MAX_COUNTERS};

/// Environment variable listing extra counters, e.g. `irq,dma,missed`.
pub const ENV_STAT_COUNTERS: &str = "DRM_STAT_COUNTERS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown counter type {0:?}")]
    UnknownCounter(String),

    #[error("counter type {0:?} configured more than once")]
    DuplicateCounter(&'static str),
}

/// Device-level settings that are independent of the attached driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    counters: Vec<StatType>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            counters: StatType::CORE.to_vec(),
        }
    }
}

impl DeviceConfig {
    /// Appends driver/device specific counters after the core set.
    ///
    /// Each kind may appear once, so the result always fits the stats response.
    pub fn with_extra_counters(
        extra: impl IntoIterator<Item = StatType>,
    ) -> Result<Self, ConfigError> {
        let mut counters = StatType::CORE.to_vec();
        for ty in extra {
            if counters.contains(&ty) {
                return Err(ConfigError::DuplicateCounter(ty.name()));
            }
            counters.push(ty);
        }
        debug_assert!(counters.len() <= MAX_COUNTERS);
        Ok(Self { counters })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(ENV_STAT_COUNTERS) {
            Ok(raw) => Self::parse_counters(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parses a comma separated counter list; empty entries are skipped.
    pub fn parse_counters(raw: &str) -> Result<Self, ConfigError> {
        let extra = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<StatType>)
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_extra_counters(extra)
    }

    pub fn counters(&self) -> &[StatType] {
        &self.counters
    }
}
