//! Built-in configuration values.

use std::time::Duration;

use crate::PortRange;

/// Lowest port scanned by default.
pub const SCAN_MIN: u16 = 3000;
/// Highest port scanned by default.
pub const SCAN_MAX: u16 = 30000;
/// Ports of the scan range bind-probed per scan.
pub const BIND_SAMPLE: usize = 200;
/// Per-command timeout for detector tools, in milliseconds.
pub const DETECTION_TIMEOUT_MS: u64 = 3000;
/// Lower bound of the auto-resolution range.
pub const EXTENDED_MIN: u16 = 10000;
/// Upper bound of the auto-resolution range.
pub const EXTENDED_MAX: u16 = 60000;
/// Days an unused active record survives a deep cleanup.
pub const EXPIRE_AFTER_DAYS: u32 = 30;
/// Range of the generic `service` type.
pub const GENERIC_MIN: u16 = 9000;
/// Upper bound of the generic `service` type range.
pub const GENERIC_MAX: u16 = 9099;

/// Directory name of the data directory, under home or a project.
pub const DATA_DIR_NAME: &str = ".berth";
/// User configuration file inside the data directory.
pub const USER_CONFIG_FILE: &str = "config.yaml";
/// Project configuration file, found by walking up from the working
/// directory.
pub const PROJECT_CONFIG_FILE: &str = "berth.yaml";

/// Default scan range.
#[must_use]
pub const fn scan_range() -> PortRange {
    PortRange::const_bounds(SCAN_MIN, SCAN_MAX)
}

/// Default extended range.
#[must_use]
pub const fn extended_range() -> PortRange {
    PortRange::const_bounds(EXTENDED_MIN, EXTENDED_MAX)
}

/// Range of the generic service type.
#[must_use]
pub const fn generic_range() -> PortRange {
    PortRange::const_bounds(GENERIC_MIN, GENERIC_MAX)
}

/// Default detector timeout.
#[must_use]
pub const fn detection_timeout() -> Duration {
    Duration::from_millis(DETECTION_TIMEOUT_MS)
}
