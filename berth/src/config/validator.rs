//! Configuration validation.

use super::schema::{AllocationConfig, Config, ScanConfig};
use crate::error::{Error, Result};

/// Validates a merged configuration.
///
/// # Examples
///
/// ```
/// use berth::config::{Config, ConfigValidator};
///
/// ConfigValidator::validate(&Config::default()).unwrap();
/// ```
pub struct ConfigValidator;

impl ConfigValidator {
    /// Rejects port 0, inverted ranges, empty project names, a zero bind
    /// sample and a zero detection timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first offending field.
    pub fn validate(config: &Config) -> Result<()> {
        if let Some(ref project) = config.project {
            Self::validate_identifier("project", project)?;
        }
        if let Some(ref scan) = config.scan {
            Self::validate_scan(scan)?;
        }
        if let Some(ref allocation) = config.allocation {
            Self::validate_allocation(allocation)?;
        }
        // bounds that are only inverted after defaults fill in
        config.scan_range()?;
        config.extended_range()?;
        Ok(())
    }

    /// Non-empty after trimming, no NUL bytes, at most 255 characters.
    fn validate_identifier(field: &str, value: &str) -> Result<()> {
        let trimmed = value.trim();
        let message = if trimmed.is_empty() {
            "cannot be empty or only whitespace"
        } else if trimmed.contains('\0') {
            "cannot contain null bytes"
        } else if trimmed.len() > 255 {
            "cannot exceed 255 characters"
        } else {
            return Ok(());
        };
        Err(Error::Validation {
            field: field.into(),
            message: message.into(),
        })
    }

    fn validate_port(field: &str, port: Option<u16>) -> Result<()> {
        if port == Some(0) {
            return Err(Error::Validation {
                field: field.into(),
                message: "port 0 is invalid".into(),
            });
        }
        Ok(())
    }

    fn validate_bounds(field: &str, min: Option<u16>, max: Option<u16>) -> Result<()> {
        if let (Some(min), Some(max)) = (min, max) {
            if max < min {
                return Err(Error::Validation {
                    field: field.into(),
                    message: format!("max ({max}) must be >= min ({min})"),
                });
            }
        }
        Ok(())
    }

    fn validate_scan(scan: &ScanConfig) -> Result<()> {
        Self::validate_port("scan.min", scan.min)?;
        Self::validate_port("scan.max", scan.max)?;
        Self::validate_bounds("scan", scan.min, scan.max)?;
        if scan.bind_sample == Some(0) {
            return Err(Error::Validation {
                field: "scan.bind_sample".into(),
                message: "must be greater than 0".into(),
            });
        }
        if scan.detection_timeout_ms == Some(0) {
            return Err(Error::Validation {
                field: "scan.detection_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        Ok(())
    }

    fn validate_allocation(allocation: &AllocationConfig) -> Result<()> {
        Self::validate_port("allocation.extended_min", allocation.extended_min)?;
        Self::validate_port("allocation.extended_max", allocation.extended_max)?;
        Self::validate_bounds(
            "allocation",
            allocation.extended_min,
            allocation.extended_max,
        )
    }
}
