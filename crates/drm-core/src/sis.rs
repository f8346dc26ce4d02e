//! SiS 300/630/540 driver identity.

use serde::Serialize;

use crate::driver::{DriverVersion, DrmDriver};

pub const DRIVER_NAME: &str = "sis";
pub const DRIVER_DESC: &str = "SIS 300/630/540";
pub const DRIVER_DATE: &str = "20060619";
pub const DRIVER_MAJOR: i32 = 1;
pub const DRIVER_MINOR: i32 = 2;
pub const DRIVER_PATCHLEVEL: i32 = 1;

/// Chip generation the driver was bound for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SisFamily {
    #[default]
    Other,
    Chip315,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SisDriver {
    family: SisFamily,
}

impl SisDriver {
    pub const fn new(family: SisFamily) -> Self {
        Self { family }
    }

    pub const fn family(&self) -> SisFamily {
        self.family
    }
}

impl DrmDriver for SisDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn desc(&self) -> &str {
        DRIVER_DESC
    }

    fn date(&self) -> &str {
        DRIVER_DATE
    }

    fn version(&self) -> DriverVersion {
        DriverVersion {
            major: DRIVER_MAJOR,
            minor: DRIVER_MINOR,
            patchlevel: DRIVER_PATCHLEVEL,
        }
    }
}
