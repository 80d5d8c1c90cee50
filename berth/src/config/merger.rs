//! Layering of configuration sources.

use super::loader::ConfigSource;
use super::schema::{AllocationConfig, CleanupConfig, Config, ScanConfig, StorageConfig};

/// Merges configurations by precedence.
pub struct ConfigMerger;

impl ConfigMerger {
    /// Merges `sources` in order; later sources win.
    #[must_use]
    pub fn merge(sources: Vec<ConfigSource>) -> Config {
        let mut result = Config::default();
        for source in sources {
            Self::merge_into(&mut result, &source.config);
        }
        result
    }

    /// Merges `source` into `target`, field by field. A `None` in `source`
    /// never clears a value.
    pub fn merge_into(target: &mut Config, source: &Config) {
        if source.project.is_some() {
            target.project.clone_from(&source.project);
        }
        if source.force_fallback.is_some() {
            target.force_fallback = source.force_fallback;
        }

        if let Some(ref scan) = source.scan {
            target.scan = Some(match &target.scan {
                Some(existing) => Self::merge_scan(existing, scan),
                None => scan.clone(),
            });
        }
        if let Some(ref allocation) = source.allocation {
            target.allocation = Some(match &target.allocation {
                Some(existing) => Self::merge_allocation(existing, allocation),
                None => allocation.clone(),
            });
        }
        if let Some(ref storage) = source.storage {
            target.storage = Some(match &target.storage {
                Some(existing) => StorageConfig {
                    scope: storage.scope.or(existing.scope),
                    backend: storage.backend.or(existing.backend),
                },
                None => storage.clone(),
            });
        }
        if let Some(ref cleanup) = source.cleanup {
            target.cleanup = Some(match &target.cleanup {
                Some(existing) => CleanupConfig {
                    expire_after_days: cleanup.expire_after_days.or(existing.expire_after_days),
                },
                None => cleanup.clone(),
            });
        }
    }

    fn merge_scan(target: &ScanConfig, source: &ScanConfig) -> ScanConfig {
        ScanConfig {
            min: source.min.or(target.min),
            max: source.max.or(target.max),
            bind_sample: source.bind_sample.or(target.bind_sample),
            detection_timeout_ms: source.detection_timeout_ms.or(target.detection_timeout_ms),
            // replaced as a whole list
            disabled_detectors: source
                .disabled_detectors
                .clone()
                .or_else(|| target.disabled_detectors.clone()),
        }
    }

    fn merge_allocation(target: &AllocationConfig, source: &AllocationConfig) -> AllocationConfig {
        AllocationConfig {
            extended_min: source.extended_min.or(target.extended_min),
            extended_max: source.extended_max.or(target.extended_max),
            auto_resolve: source.auto_resolve.or(target.auto_resolve),
        }
    }
}
