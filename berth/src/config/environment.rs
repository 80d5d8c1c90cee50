//! `BERTH_*` environment variable overrides.

use std::env;

use super::schema::{CleanupConfig, Config, StorageScope};
use crate::error::{Error, Result};
use crate::scanner::Detector;
use crate::store::StoreBackend;

/// Overrides the project name.
pub const ENV_PROJECT: &str = "BERTH_PROJECT";
/// Overrides `scan.min`.
pub const ENV_SCAN_MIN: &str = "BERTH_SCAN_MIN";
/// Overrides `scan.max`.
pub const ENV_SCAN_MAX: &str = "BERTH_SCAN_MAX";
/// Overrides `storage.backend`.
pub const ENV_STORAGE_BACKEND: &str = "BERTH_STORAGE_BACKEND";
/// Overrides `storage.scope`.
pub const ENV_STORAGE_SCOPE: &str = "BERTH_STORAGE_SCOPE";
/// Overrides `force_fallback`.
pub const ENV_FORCE_FALLBACK: &str = "BERTH_FORCE_FALLBACK";
/// Overrides `scan.detection_timeout_ms`.
pub const ENV_DETECTION_TIMEOUT_MS: &str = "BERTH_DETECTION_TIMEOUT_MS";
/// Overrides `scan.disabled_detectors` (comma-separated).
pub const ENV_DISABLED_DETECTORS: &str = "BERTH_DISABLED_DETECTORS";
/// Overrides `cleanup.expire_after_days`.
pub const ENV_EXPIRE_AFTER_DAYS: &str = "BERTH_EXPIRE_AFTER_DAYS";
/// Overrides the data directory.
pub const ENV_DATA_DIR: &str = "BERTH_DATA_DIR";

/// Applies environment overrides to a configuration.
///
/// # Examples
///
/// ```no_run
/// use berth::config::{Config, EnvironmentConfig};
///
/// let mut config = Config::default();
/// EnvironmentConfig::apply_overrides(&mut config).unwrap();
/// ```
pub struct EnvironmentConfig;

impl EnvironmentConfig {
    /// Applies the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value.
    pub fn apply_overrides(config: &mut Config) -> Result<()> {
        Self::apply_from(config, |key| env::var(key).ok())
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value.
    pub fn apply_from<F>(config: &mut Config, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project) = lookup(ENV_PROJECT) {
            config.project = Some(project);
        }
        if let Some(value) = lookup(ENV_FORCE_FALLBACK) {
            config.force_fallback = Some(Self::parse_bool(ENV_FORCE_FALLBACK, &value)?);
        }

        let mut scan = config.scan.clone().unwrap_or_default();
        let scan_before = scan.clone();
        if let Some(value) = lookup(ENV_SCAN_MIN) {
            scan.min = Some(Self::parse_number(ENV_SCAN_MIN, &value)?);
        }
        if let Some(value) = lookup(ENV_SCAN_MAX) {
            scan.max = Some(Self::parse_number(ENV_SCAN_MAX, &value)?);
        }
        if let Some(value) = lookup(ENV_DETECTION_TIMEOUT_MS) {
            scan.detection_timeout_ms = Some(Self::parse_number(ENV_DETECTION_TIMEOUT_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_DISABLED_DETECTORS) {
            scan.disabled_detectors = Some(Self::parse_detectors(&value)?);
        }
        if scan != scan_before {
            config.scan = Some(scan);
        }

        let mut storage = config.storage.clone().unwrap_or_default();
        let storage_before = storage.clone();
        if let Some(value) = lookup(ENV_STORAGE_BACKEND) {
            storage.backend = Some(value.parse::<StoreBackend>()?);
        }
        if let Some(value) = lookup(ENV_STORAGE_SCOPE) {
            storage.scope = Some(Self::parse_scope(&value)?);
        }
        if storage != storage_before {
            config.storage = Some(storage);
        }

        if let Some(value) = lookup(ENV_EXPIRE_AFTER_DAYS) {
            let days = Self::parse_number(ENV_EXPIRE_AFTER_DAYS, &value)?;
            config
                .cleanup
                .get_or_insert_with(CleanupConfig::default)
                .expire_after_days = Some(days);
        }

        Ok(())
    }

    /// Accepts true/1/yes/on and false/0/no/off, case-insensitively.
    fn parse_bool(field: &str, s: &str) -> Result<bool> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Error::Validation {
                field: field.into(),
                message: format!("invalid boolean '{s}' (expected true/false/1/0/yes/no/on/off)"),
            }),
        }
    }

    fn parse_number<T: std::str::FromStr>(field: &str, s: &str) -> Result<T> {
        s.trim().parse().map_err(|_| Error::Validation {
            field: field.into(),
            message: format!("'{s}' is not a valid number"),
        })
    }

    fn parse_scope(s: &str) -> Result<StorageScope> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(StorageScope::Global),
            "local" => Ok(StorageScope::Local),
            _ => Err(Error::Validation {
                field: ENV_STORAGE_SCOPE.into(),
                message: format!("invalid scope '{s}' (expected global or local)"),
            }),
        }
    }

    fn parse_detectors(s: &str) -> Result<Vec<Detector>> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<Detector>().map_err(|message| Error::Validation {
                    field: ENV_DISABLED_DETECTORS.into(),
                    message,
                })
            })
            .collect()
    }
}
