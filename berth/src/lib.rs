#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # berth
//!
//! Port scanning and multi-project port allocation for local development
//! stacks.
//!
//! berth finds which ports on this machine are in use, hands each service
//! of each project a port that is free and not claimed by another project,
//! remembers those choices across runs, and writes the `.env`, shell,
//! JSON and compose files a stack needs to use them.
//!
//! ## Core Types
//!
//! - [`Port`] and [`PortRange`]: validated port numbers and ranges
//! - [`PortScanner`]: layered detection of occupied ports
//! - [`ServiceRegistry`]: service types, classification and templates
//! - [`PortAllocator`]: persistent, conflict-free allocation
//! - [`FallbackAllocator`]: bind-probe-only allocation when the rest is
//!   unavailable
//! - [`Berth`]: the facade choosing between the two
//!
//! ## Examples
//!
//! ```
//! use berth::scanner::MockChecker;
//! use berth::store::MemoryStore;
//! use berth::{PortAllocator, ServiceRegistry};
//!
//! let mut allocator = PortAllocator::new(
//!     MemoryStore::new(),
//!     MockChecker::new(),
//!     ServiceRegistry::builtin(),
//! );
//! let batch = allocator
//!     .allocate_batch("shop", &["frontend".into(), "postgres".into()])
//!     .unwrap();
//! assert_eq!(batch.port_of("frontend"), Some(3000));
//! assert_eq!(batch.port_of("postgres"), Some(5433));
//! ```

pub mod allocation;
pub mod allocator;
pub mod config;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod logging;
pub mod output;
pub mod port;
pub mod registry;
pub mod scanner;
pub mod store;

pub use allocation::{AllocatedPort, AllocationState, ConflictResolution, ProjectPorts};
pub use allocator::{
    AllocationReport, BatchAllocation, CleanupReport, PortAllocator, ServiceRequest,
};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use facade::{Berth, Diagnostics, Engine};
pub use fallback::FallbackAllocator;
pub use logging::{init_logger, LogLevel, Logger};
pub use output::{ArtifactFormat, ArtifactGenerator, ShellType};
pub use port::{DetectionMethod, Port, PortInfo, PortRange, PortStatus, Protocol};
pub use registry::{ServiceDefinition, ServiceRegistry, ServiceType};
pub use scanner::{Capabilities, Detector, PortScanner};
pub use store::{AllocationStore, StoreBackend};
