//! Configuration.
//!
//! Sources are layered, highest precedence first:
//!
//! 1. Programmatic overrides ([`ConfigBuilder::with_config`])
//! 2. `BERTH_*` environment variables
//! 3. The nearest `berth.yaml` at or above the working directory
//! 4. `config.yaml` in the data directory
//! 5. Built-in [`defaults`]
//!
//! ```yaml
//! project: demo
//! scan:
//!   min: 3000
//!   max: 30000
//!   bind_sample: 200
//!   detection_timeout_ms: 3000
//!   disabled_detectors: [container_runtime]
//! allocation:
//!   extended_min: 10000
//!   extended_max: 60000
//!   auto_resolve: true
//! storage:
//!   scope: global
//!   backend: json
//! cleanup:
//!   expire_after_days: 30
//! force_fallback: false
//! ```

pub mod builder;
pub mod defaults;
pub mod environment;
pub mod loader;
pub mod merger;
pub mod paths;
pub mod schema;
pub mod validator;

pub use builder::ConfigBuilder;
pub use environment::EnvironmentConfig;
pub use loader::{ConfigLoader, ConfigSource};
pub use merger::ConfigMerger;
pub use paths::{default_data_dir, global_data_dir, resolve_data_dir};
pub use schema::{
    AllocationConfig, CleanupConfig, Config, ScanConfig, StorageConfig, StorageScope,
};
pub use validator::ConfigValidator;
