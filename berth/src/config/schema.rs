//! Configuration schema.
//!
//! Every field is optional so that sources can be layered; the accessor
//! methods on [`Config`] fill in [`defaults`](super::defaults) for anything
//! no source set.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::error::Result;
use crate::scanner::{Detector, ScannerConfig};
use crate::store::StoreBackend;
use crate::PortRange;

/// Complete configuration.
///
/// # Examples
///
/// ```
/// use berth::config::{Config, ScanConfig};
///
/// let config: Config = serde_yaml::from_str(
///     "project: demo\nscan:\n  min: 4000\n  max: 4999\n",
/// )
/// .unwrap();
/// assert_eq!(config.project.as_deref(), Some("demo"));
/// assert_eq!(config.scan_range().unwrap().min().value(), 4000);
/// assert_eq!(config.bind_sample(), 200);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Default project name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Scanner settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanConfig>,

    /// Allocator settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocationConfig>,

    /// Where allocations are stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Cleanup settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupConfig>,

    /// Skip the primary engine and use bind-probe fallback only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_fallback: Option<bool>,
}

/// Scanner settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Lowest scanned port.
    pub min: Option<u16>,
    /// Highest scanned port.
    pub max: Option<u16>,
    /// Ports of the range bind-probed per scan.
    pub bind_sample: Option<usize>,
    /// Timeout for each detector tool.
    pub detection_timeout_ms: Option<u64>,
    /// Detectors that must not run.
    pub disabled_detectors: Option<Vec<Detector>>,
}

/// Allocator settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AllocationConfig {
    /// Lower bound of the auto-resolution range.
    pub extended_min: Option<u16>,
    /// Upper bound of the auto-resolution range.
    pub extended_max: Option<u16>,
    /// Search the extended range when a type range is exhausted.
    pub auto_resolve: Option<bool>,
}

/// Storage settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Global or per-project data directory.
    pub scope: Option<StorageScope>,
    /// Persistent backend.
    pub backend: Option<StoreBackend>,
}

/// Cleanup settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Days an unused active record survives a deep cleanup.
    pub expire_after_days: Option<u32>,
}

/// Which data directory holds the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// `$BERTH_DATA_DIR` or `~/.berth`, shared by every project.
    #[default]
    Global,
    /// `<project dir>/.berth`.
    Local,
}

impl Config {
    fn scan_or_default(&self) -> ScanConfig {
        self.scan.clone().unwrap_or_default()
    }

    /// Effective scan range.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured bounds are invalid.
    pub fn scan_range(&self) -> Result<PortRange> {
        let scan = self.scan_or_default();
        Ok(PortRange::from_bounds(
            scan.min.unwrap_or(defaults::SCAN_MIN),
            scan.max.unwrap_or(defaults::SCAN_MAX),
        )?)
    }

    /// Effective bind-probe sample size.
    #[must_use]
    pub fn bind_sample(&self) -> usize {
        self.scan_or_default()
            .bind_sample
            .unwrap_or(defaults::BIND_SAMPLE)
    }

    /// Effective detector timeout.
    #[must_use]
    pub fn detection_timeout(&self) -> Duration {
        self.scan_or_default()
            .detection_timeout_ms
            .map_or_else(defaults::detection_timeout, Duration::from_millis)
    }

    /// Detectors that must not run.
    #[must_use]
    pub fn disabled_detectors(&self) -> Vec<Detector> {
        self.scan_or_default().disabled_detectors.unwrap_or_default()
    }

    /// Scanner settings derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan range is invalid.
    pub fn scanner_config(&self) -> Result<ScannerConfig> {
        Ok(ScannerConfig {
            range: self.scan_range()?,
            bind_sample: self.bind_sample(),
            timeout: self.detection_timeout(),
            disabled: self.disabled_detectors(),
        })
    }

    /// Effective auto-resolution range.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured bounds are invalid.
    pub fn extended_range(&self) -> Result<PortRange> {
        let allocation = self.allocation.clone().unwrap_or_default();
        Ok(PortRange::from_bounds(
            allocation.extended_min.unwrap_or(defaults::EXTENDED_MIN),
            allocation.extended_max.unwrap_or(defaults::EXTENDED_MAX),
        )?)
    }

    /// Whether auto-resolution is on. Defaults to `true`.
    #[must_use]
    pub fn auto_resolve(&self) -> bool {
        self.allocation
            .as_ref()
            .and_then(|a| a.auto_resolve)
            .unwrap_or(true)
    }

    /// Effective storage scope.
    #[must_use]
    pub fn storage_scope(&self) -> StorageScope {
        self.storage
            .as_ref()
            .and_then(|s| s.scope)
            .unwrap_or_default()
    }

    /// Effective storage backend.
    #[must_use]
    pub fn storage_backend(&self) -> StoreBackend {
        self.storage
            .as_ref()
            .and_then(|s| s.backend)
            .unwrap_or_default()
    }

    /// Age after which a deep cleanup expires unused active records.
    #[must_use]
    pub fn expire_after(&self) -> chrono::Duration {
        let days = self
            .cleanup
            .as_ref()
            .and_then(|c| c.expire_after_days)
            .unwrap_or(defaults::EXPIRE_AFTER_DAYS);
        chrono::Duration::days(i64::from(days))
    }

    /// Whether the fallback engine is forced.
    #[must_use]
    pub fn force_fallback(&self) -> bool {
        self.force_fallback.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::default();
        assert_eq!(config.scan_range().unwrap(), defaults::scan_range());
        assert_eq!(config.extended_range().unwrap(), defaults::extended_range());
        assert_eq!(config.detection_timeout(), Duration::from_millis(3000));
        assert!(config.auto_resolve());
        assert_eq!(config.storage_backend(), StoreBackend::Json);
        assert_eq!(config.storage_scope(), StorageScope::Global);
        assert_eq!(config.expire_after(), chrono::Duration::days(30));
        assert!(!config.force_fallback());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r"
project: demo
scan:
  min: 3000
  max: 30000
  bind_sample: 50
  detection_timeout_ms: 1500
  disabled_detectors: [container_runtime]
allocation:
  extended_min: 20000
  extended_max: 21000
  auto_resolve: false
storage:
  scope: local
  backend: sqlite
cleanup:
  expire_after_days: 7
force_fallback: true
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bind_sample(), 50);
        assert_eq!(config.disabled_detectors(), vec![Detector::ContainerRuntime]);
        assert_eq!(config.extended_range().unwrap().max().value(), 21000);
        assert!(!config.auto_resolve());
        assert_eq!(config.storage_scope(), StorageScope::Local);
        assert_eq!(config.storage_backend(), StoreBackend::Sqlite);
        assert_eq!(config.expire_after(), chrono::Duration::days(7));
        assert!(config.force_fallback());

        let scanner = config.scanner_config().unwrap();
        assert_eq!(scanner.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_yaml::from_str::<Config>("colour: blue\n").is_err());
        assert!(serde_yaml::from_str::<Config>("scan:\n  minimum: 1\n").is_err());
    }

    #[test]
    fn test_inverted_range_is_an_error() {
        let config: Config = serde_yaml::from_str("scan:\n  min: 5000\n  max: 4000\n").unwrap();
        assert!(config.scan_range().is_err());
    }
}
