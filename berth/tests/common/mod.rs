//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::Path;

use berth::config::{AllocationConfig, ScanConfig, StorageConfig};
use berth::scanner::{Detector, MockChecker};
use berth::store::MemoryStore;
use berth::{Config, PortAllocator, ServiceRegistry, StoreBackend};

/// Allocator over an empty in-memory store where `occupied` are taken.
pub fn memory_allocator(occupied: &[u16]) -> PortAllocator<MemoryStore, MockChecker> {
    PortAllocator::new(
        MemoryStore::new(),
        MockChecker::occupied(occupied.iter().copied()),
        ServiceRegistry::builtin(),
    )
}

/// Configuration for real-host tests: a small scan window, no slow
/// detectors, and the given store backend.
pub fn host_config(backend: StoreBackend) -> Config {
    Config {
        project: Some("demo".into()),
        scan: Some(ScanConfig {
            min: Some(3000),
            max: Some(3999),
            bind_sample: Some(20),
            detection_timeout_ms: Some(1000),
            disabled_detectors: Some(vec![Detector::ContainerRuntime, Detector::LegacyListing]),
        }),
        allocation: Some(AllocationConfig {
            extended_min: Some(20000),
            extended_max: Some(20999),
            auto_resolve: Some(true),
        }),
        storage: Some(StorageConfig {
            scope: None,
            backend: Some(backend),
        }),
        cleanup: None,
        force_fallback: None,
    }
}

/// Whether every port in `ports` is distinct.
pub fn all_distinct(ports: &[u16]) -> bool {
    let mut sorted = ports.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).all(|w| w[0] != w[1])
}

/// Whether `dir` holds the record file of `backend`.
pub fn has_record(dir: &Path, backend: StoreBackend) -> bool {
    dir.join(backend.file_name()).is_file()
}
