//! Durable allocation records.
//!
//! An [`AllocatedPort`] moves through `CREATED -> ACTIVE -> RELEASED` and is
//! only removed by an explicit cleanup. A released record is never
//! reactivated; allocating the same service again creates a new record and
//! the old one moves to [`ProjectPorts::retired`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Port, Result};

/// How a port was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The caller's preferred port.
    Preferred,
    /// The service type's default port.
    DefaultPort,
    /// A free port from the service type's range.
    RangeSearch,
    /// A free port from the extended range, outside the type's range.
    AutoResolvedExtendedRange,
    /// Picked by the reduced-capability fallback path.
    Fallback,
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Preferred => "preferred",
            Self::DefaultPort => "default_port",
            Self::RangeSearch => "range_search",
            Self::AutoResolvedExtendedRange => "auto_resolved_extended_range",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "preferred" => Ok(Self::Preferred),
            "default_port" => Ok(Self::DefaultPort),
            "range_search" => Ok(Self::RangeSearch),
            "auto_resolved_extended_range" => Ok(Self::AutoResolvedExtendedRange),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!("unknown conflict resolution: {other}")),
        }
    }
}

/// One `(project, service) -> port` decision.
///
/// # Examples
///
/// ```
/// use berth::{AllocatedPort, ConflictResolution, Port};
///
/// let record = AllocatedPort::builder("demo", "frontend", Port::try_from(3000).unwrap())
///     .service_type("frontend")
///     .resolution(ConflictResolution::DefaultPort)
///     .build()
///     .unwrap();
///
/// assert!(record.is_active());
/// assert_eq!(record.port().value(), 3000);
/// assert!(record.last_used() >= record.allocated_at());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedPort {
    port: Port,
    service_name: String,
    service_type: String,
    project_name: String,
    allocated_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    is_active: bool,
    conflict_resolution: ConflictResolution,
}

impl AllocatedPort {
    /// Starts building a new active record.
    #[must_use]
    pub fn builder(
        project_name: impl Into<String>,
        service_name: impl Into<String>,
        port: Port,
    ) -> AllocatedPortBuilder {
        AllocatedPortBuilder {
            port,
            service_name: service_name.into(),
            service_type: None,
            project_name: project_name.into(),
            allocated_at: None,
            conflict_resolution: ConflictResolution::RangeSearch,
        }
    }

    /// The assigned port.
    #[must_use]
    pub const fn port(&self) -> Port {
        self.port
    }

    /// The service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The registry type the service was classified as.
    #[must_use]
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// The owning project.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// When the record was created.
    #[must_use]
    pub const fn allocated_at(&self) -> DateTime<Utc> {
        self.allocated_at
    }

    /// When the record was last handed out.
    #[must_use]
    pub const fn last_used(&self) -> DateTime<Utc> {
        self.last_used
    }

    /// Whether the record still claims its port.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// How the port was chosen.
    #[must_use]
    pub const fn conflict_resolution(&self) -> ConflictResolution {
        self.conflict_resolution
    }

    /// Records a reuse. Never moves `last_used` backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_used {
            self.last_used = now;
        }
    }

    /// Releases the record. There is no way back to active.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Whether the record has gone unused for longer than `max_age`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.last_used) > max_age
    }
}

/// Builder for [`AllocatedPort`].
#[derive(Debug)]
pub struct AllocatedPortBuilder {
    port: Port,
    service_name: String,
    service_type: Option<String>,
    project_name: String,
    allocated_at: Option<DateTime<Utc>>,
    conflict_resolution: ConflictResolution,
}

impl AllocatedPortBuilder {
    /// Sets the service type (defaults to the generic type).
    #[must_use]
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    /// Sets how the port was chosen.
    #[must_use]
    pub const fn resolution(mut self, resolution: ConflictResolution) -> Self {
        self.conflict_resolution = resolution;
        self
    }

    /// Sets the creation time (defaults to now). `last_used` starts equal.
    #[must_use]
    pub const fn allocated_at(mut self, at: DateTime<Utc>) -> Self {
        self.allocated_at = Some(at);
        self
    }

    /// Builds the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the project or service name is
    /// empty after trimming.
    pub fn build(self) -> Result<AllocatedPort> {
        let project_name = self.project_name.trim().to_string();
        let service_name = self.service_name.trim().to_string();
        if project_name.is_empty() {
            return Err(Error::Validation {
                field: "project".into(),
                message: "project name must be non-empty".into(),
            });
        }
        if service_name.is_empty() {
            return Err(Error::Validation {
                field: "service".into(),
                message: "service name must be non-empty".into(),
            });
        }

        let at = self.allocated_at.unwrap_or_else(Utc::now);
        Ok(AllocatedPort {
            port: self.port,
            service_name,
            service_type: self
                .service_type
                .unwrap_or_else(|| crate::registry::GENERIC_TYPE.to_string()),
            project_name,
            allocated_at: at,
            last_used: at,
            is_active: true,
            conflict_resolution: self.conflict_resolution,
        })
    }

    /// Rebuilds a persisted record with its recorded usage and state.
    pub(crate) fn restore(self, last_used: DateTime<Utc>, is_active: bool) -> Result<AllocatedPort> {
        let mut record = self.build()?;
        record.touch(last_used);
        if !is_active {
            record.deactivate();
        }
        Ok(record)
    }
}

/// All records of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPorts {
    /// Project name.
    pub project_name: String,
    /// Latest record per service, active or released.
    pub ports: BTreeMap<String, AllocatedPort>,
    /// Released records superseded by a newer allocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired: Vec<AllocatedPort>,
    /// When the project was first seen.
    pub created_at: DateTime<Utc>,
    /// When any record last changed.
    pub updated_at: DateTime<Utc>,
}

impl ProjectPorts {
    /// An empty project.
    #[must_use]
    pub fn new(project_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            project_name: project_name.into(),
            ports: BTreeMap::new(),
            retired: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The active record for `service`, if any.
    #[must_use]
    pub fn active(&self, service: &str) -> Option<&AllocatedPort> {
        self.ports.get(service).filter(|r| r.is_active())
    }

    /// Active records, by service name.
    pub fn active_records(&self) -> impl Iterator<Item = &AllocatedPort> {
        self.ports.values().filter(|r| r.is_active())
    }

    /// Number of records that are not active, retired ones included.
    #[must_use]
    pub fn inactive_count(&self) -> usize {
        self.ports.values().filter(|r| !r.is_active()).count() + self.retired.len()
    }

    /// Stores a new record for its service. A previous record for the same
    /// service is released and moved to `retired`.
    pub fn insert(&mut self, record: AllocatedPort, now: DateTime<Utc>) {
        if let Some(mut previous) = self.ports.remove(record.service_name()) {
            previous.deactivate();
            self.retired.push(previous);
        }
        self.ports.insert(record.service_name().to_string(), record);
        self.updated_at = now;
    }

    /// Releases the active record for `service`. Returns `false` if there
    /// was none.
    pub fn deactivate(&mut self, service: &str, now: DateTime<Utc>) -> bool {
        match self.ports.get_mut(service) {
            Some(record) if record.is_active() => {
                record.deactivate();
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }
}

/// The whole durable allocations record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationState {
    /// Bumped by the store on every successful save.
    #[serde(default)]
    pub revision: u64,
    /// Projects by name.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectPorts>,
}

impl AllocationState {
    /// Every active record across all projects.
    pub fn active_records(&self) -> impl Iterator<Item = &AllocatedPort> {
        self.projects.values().flat_map(ProjectPorts::active_records)
    }

    /// The active record holding `port`, if any.
    #[must_use]
    pub fn claimant(&self, port: u16) -> Option<&AllocatedPort> {
        self.active_records().find(|r| r.port().value() == port)
    }

    /// Whether any active record holds `port`.
    #[must_use]
    pub fn is_claimed(&self, port: u16) -> bool {
        self.claimant(port).is_some()
    }

    /// The project entry, created if missing.
    pub fn project_mut(&mut self, project: &str, now: DateTime<Utc>) -> &mut ProjectPorts {
        self.projects
            .entry(project.to_string())
            .or_insert_with(|| ProjectPorts::new(project, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(p: u16) -> Port {
        Port::try_from(p).unwrap()
    }

    fn record(project: &str, service: &str, p: u16) -> AllocatedPort {
        AllocatedPort::builder(project, service, port(p))
            .service_type("frontend")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_trims_and_validates() {
        let rec = AllocatedPort::builder("  demo ", " web ", port(3000))
            .build()
            .unwrap();
        assert_eq!(rec.project_name(), "demo");
        assert_eq!(rec.service_name(), "web");
        assert_eq!(rec.service_type(), "service");
        assert_eq!(rec.conflict_resolution(), ConflictResolution::RangeSearch);

        assert!(AllocatedPort::builder(" ", "web", port(3000)).build().is_err());
        assert!(AllocatedPort::builder("demo", "", port(3000)).build().is_err());
    }

    #[test]
    fn test_touch_never_goes_backwards() {
        let mut rec = record("demo", "web", 3000);
        let before = rec.last_used();
        rec.touch(before - Duration::hours(1));
        assert_eq!(rec.last_used(), before);
        rec.touch(before + Duration::hours(1));
        assert!(rec.last_used() > rec.allocated_at());
    }

    #[test]
    fn test_insert_retires_previous_record() {
        let now = Utc::now();
        let mut project = ProjectPorts::new("demo", now);
        project.insert(record("demo", "web", 3000), now);
        assert!(project.deactivate("web", now));
        assert!(!project.deactivate("web", now));

        project.insert(record("demo", "web", 3001), now);
        assert_eq!(project.active("web").unwrap().port().value(), 3001);
        assert_eq!(project.retired.len(), 1);
        assert!(!project.retired[0].is_active());
        assert_eq!(project.inactive_count(), 1);
    }

    #[test]
    fn test_claimant_only_counts_active() {
        let now = Utc::now();
        let mut state = AllocationState::default();
        state.project_mut("a", now).insert(record("a", "web", 3000), now);
        state.project_mut("b", now).insert(record("b", "web", 3001), now);
        state.project_mut("b", now).deactivate("web", now);

        assert_eq!(state.claimant(3000).unwrap().project_name(), "a");
        assert!(!state.is_claimed(3001));
        assert_eq!(state.active_records().count(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let rec = record("demo", "web", 3000);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["port"], 3000);
        assert_eq!(json["is_active"], true);
        assert_eq!(json["conflict_resolution"], "range_search");
        assert!(json["allocated_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_stale_by_last_used() {
        let at = Utc::now() - Duration::days(40);
        let rec = AllocatedPort::builder("demo", "web", port(3000))
            .allocated_at(at)
            .build()
            .unwrap();
        assert!(rec.is_stale(Utc::now(), Duration::days(30)));
        assert!(!rec.is_stale(Utc::now(), Duration::days(60)));
    }
}
