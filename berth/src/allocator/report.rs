//! Result types returned by the allocator.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::allocation::AllocatedPort;
use crate::port::PortInfo;

/// One service of a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRequest {
    /// Service name.
    pub name: String,
    /// Explicit registry type; classified from the name when absent.
    pub service_type: Option<String>,
    /// Port to try first.
    pub preferred: Option<u16>,
}

impl ServiceRequest {
    /// A request with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: None,
            preferred: None,
        }
    }

    /// Sets the service type.
    #[must_use]
    pub fn with_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    /// Sets the preferred port.
    #[must_use]
    pub const fn prefer(mut self, port: u16) -> Self {
        self.preferred = Some(port);
        self
    }
}

impl From<&str> for ServiceRequest {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A service the batch could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationFailure {
    /// Service name.
    pub service: String,
    /// Why no port was assigned.
    pub reason: String,
}

impl fmt::Display for AllocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.service, self.reason)
    }
}

/// Outcome of a batch allocation. Every requested service appears in
/// exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchAllocation {
    /// Placed services, in allocation (priority) order.
    pub allocated: Vec<AllocatedPort>,
    /// Services left without a port.
    pub failed: Vec<AllocationFailure>,
}

impl BatchAllocation {
    /// Whether every service got a port.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The port assigned to `service`, if any.
    #[must_use]
    pub fn port_of(&self, service: &str) -> Option<u16> {
        self.allocated
            .iter()
            .find(|r| r.service_name() == service)
            .map(|r| r.port().value())
    }
}

/// Who holds a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortOwner {
    /// Owning project.
    pub project: String,
    /// Owning service.
    pub service: String,
    /// The service's type.
    pub service_type: String,
}

/// Snapshot of every allocation plus live conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    /// When the report was taken.
    pub generated_at: DateTime<Utc>,
    /// Number of projects with any record.
    pub projects: usize,
    /// Number of active records.
    pub active: usize,
    /// Number of released and retired records.
    pub inactive: usize,
    /// Active ports and their owners.
    pub ports: BTreeMap<u16, PortOwner>,
    /// Active ports a fresh scan reports as occupied.
    pub conflicts: Vec<PortInfo>,
}

/// Why cleanup removed a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeReason {
    /// The record had been released.
    Released,
    /// The record was superseded by a newer allocation.
    Retired,
    /// Deep cleanup: active but unused for too long.
    Expired,
}

/// One record removed by cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgedRecord {
    /// Owning project.
    pub project: String,
    /// Service name.
    pub service: String,
    /// The port it held.
    pub port: u16,
    /// Why it was removed.
    pub reason: PurgeReason,
}

/// What cleanup removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Removed records.
    pub purged: Vec<PurgedRecord>,
    /// Projects dropped because nothing was left in them.
    pub removed_projects: Vec<String>,
}

impl CleanupReport {
    /// Whether anything was removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.purged.is_empty() && self.removed_projects.is_empty()
    }

    /// Number of removed records with `reason`.
    #[must_use]
    pub fn count(&self, reason: PurgeReason) -> usize {
        self.purged.iter().filter(|p| p.reason == reason).count()
    }
}
