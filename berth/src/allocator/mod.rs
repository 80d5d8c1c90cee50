//! Durable `(project, service) -> port` allocation.
//!
//! [`PortAllocator::allocate`] tries, in order and first success wins:
//!
//! 1. reuse of the service's active record while its port is still free
//!    (otherwise the record is released and allocation continues),
//! 2. the caller's preferred port,
//! 3. the service type's default port,
//! 4. up to [`MAX_RANGE_CANDIDATES`] free ports of the type's range,
//! 5. with auto-resolution on, the extended range.
//!
//! A candidate must look free to the checker and be unclaimed by every
//! active record in every project. The chosen candidate is bound-probed
//! once more right before commit; a candidate failing that live check is
//! skipped. Every mutation is a single load-modify-save on the store.

mod proptests;
mod report;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};

pub use report::{
    AllocationFailure, AllocationReport, BatchAllocation, CleanupReport, PortOwner, PurgeReason,
    PurgedRecord, ServiceRequest,
};

use crate::allocation::{AllocatedPort, AllocationState, ConflictResolution};
use crate::registry::{ServiceRegistry, ServiceType};
use crate::scanner::PortChecker;
use crate::store::{transaction, AllocationStore};
use crate::{Error, Port, PortRange, Result};

/// Free candidates tried per range before moving on.
pub const MAX_RANGE_CANDIDATES: usize = 5;

/// What one `allocate` call is asking for.
struct Placement<'a> {
    project: &'a str,
    service: &'a str,
    service_type: &'a ServiceType,
    preferred: Option<Port>,
    extended: Option<PortRange>,
}

/// The allocation engine.
///
/// # Examples
///
/// ```
/// use berth::scanner::MockChecker;
/// use berth::store::MemoryStore;
/// use berth::{ConflictResolution, PortAllocator, ServiceRegistry};
///
/// let mut allocator = PortAllocator::new(
///     MemoryStore::new(),
///     MockChecker::occupied([3000]),
///     ServiceRegistry::builtin(),
/// );
///
/// let record = allocator
///     .allocate("shop", "frontend", None, None, true)
///     .unwrap()
///     .unwrap();
/// assert_eq!(record.port().value(), 3001);
/// assert_eq!(record.conflict_resolution(), ConflictResolution::RangeSearch);
///
/// // same request, same answer
/// let again = allocator.allocate("shop", "frontend", None, None, true).unwrap().unwrap();
/// assert_eq!(again.port(), record.port());
/// ```
pub struct PortAllocator<S, C> {
    store: S,
    checker: C,
    registry: ServiceRegistry,
    extended_range: PortRange,
    auto_resolve: bool,
}

impl<S: AllocationStore, C: PortChecker> PortAllocator<S, C> {
    /// An allocator with the default extended range and auto-resolution
    /// on.
    #[must_use]
    pub fn new(store: S, checker: C, registry: ServiceRegistry) -> Self {
        Self {
            store,
            checker,
            registry,
            extended_range: crate::config::defaults::extended_range(),
            auto_resolve: true,
        }
    }

    /// Sets the range searched by auto-resolution.
    #[must_use]
    pub fn with_extended_range(mut self, range: PortRange) -> Self {
        self.extended_range = range;
        self
    }

    /// Sets the auto-resolution default used by [`Self::allocate_batch`].
    #[must_use]
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    /// Changes the auto-resolution default in place.
    pub fn set_auto_resolve(&mut self, auto_resolve: bool) {
        self.auto_resolve = auto_resolve;
    }

    /// The service catalog.
    #[must_use]
    pub const fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// The occupancy checker.
    pub fn checker_mut(&mut self) -> &mut C {
        &mut self.checker
    }

    /// The store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The range auto-resolution searches.
    #[must_use]
    pub const fn extended_range(&self) -> PortRange {
        self.extended_range
    }

    /// Classifies a service name.
    #[must_use]
    pub fn classify(&self, service: &str) -> &ServiceType {
        self.registry.classify(service)
    }

    /// Assigns a port to `service` of `project`.
    ///
    /// Returns `Ok(None)` when every step came up empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty names or a preferred port of
    /// 0, and store errors once contention retries are exhausted.
    pub fn allocate(
        &mut self,
        project: &str,
        service: &str,
        preferred: Option<u16>,
        service_type: Option<&str>,
        auto_resolve: bool,
    ) -> Result<Option<AllocatedPort>> {
        let project = require_name("project", project)?;
        let service = require_name("service", service)?;
        let preferred = preferred.map(Port::try_from).transpose()?;
        let service_type = self.registry.resolve(service, service_type).clone();

        let placement = Placement {
            project,
            service,
            service_type: &service_type,
            preferred,
            extended: auto_resolve.then_some(self.extended_range),
        };
        let checker = &mut self.checker;
        let record = transaction(&mut self.store, |state| {
            place(state, checker, &placement, Utc::now())
        })?;

        match &record {
            Some(r) => log::info!(
                "{project}/{service} -> {} ({})",
                r.port(),
                r.conflict_resolution()
            ),
            None => log::error!(
                "no free port for {project}/{service} (type {}, range {})",
                service_type.name,
                service_type.port_range
            ),
        }
        Ok(record)
    }

    /// Allocates several services, most urgent type first.
    ///
    /// Services are sorted by their type's priority; equal priorities keep
    /// the input order. A service that cannot be placed is reported in
    /// [`BatchAllocation::failed`] and the rest continue.
    ///
    /// # Errors
    ///
    /// Returns store errors and validation errors; exhaustion is not an
    /// error.
    pub fn allocate_batch(
        &mut self,
        project: &str,
        services: &[ServiceRequest],
    ) -> Result<BatchAllocation> {
        let mut ordered: Vec<(u32, &ServiceRequest)> = services
            .iter()
            .map(|request| {
                let ty = self
                    .registry
                    .resolve(&request.name, request.service_type.as_deref());
                (ty.priority, request)
            })
            .collect();
        ordered.sort_by_key(|(priority, _)| *priority);

        let mut batch = BatchAllocation::default();
        let auto_resolve = self.auto_resolve;
        for (_, request) in ordered {
            let placed = self.allocate(
                project,
                &request.name,
                request.preferred,
                request.service_type.as_deref(),
                auto_resolve,
            )?;
            match placed {
                Some(record) => batch.allocated.push(record),
                None => {
                    let ty = self
                        .registry
                        .resolve(&request.name, request.service_type.as_deref());
                    let searched = if auto_resolve {
                        format!("{} and {}", ty.port_range, self.extended_range)
                    } else {
                        ty.port_range.to_string()
                    };
                    let reason = Error::AllocationExhausted {
                        service: request.name.clone(),
                        reason: format!("no free port in {searched}"),
                    };
                    batch.failed.push(AllocationFailure {
                        service: request.name.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
        Ok(batch)
    }

    /// Releases the active record of `service`. Returns `false` if there
    /// was none.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn release(&mut self, project: &str, service: &str) -> Result<bool> {
        let released = transaction(&mut self.store, |state| {
            let now = Utc::now();
            Ok(state
                .projects
                .get_mut(project)
                .is_some_and(|p| p.deactivate(service, now)))
        })?;
        if released {
            log::info!("released {project}/{service}");
        }
        Ok(released)
    }

    /// Releases every active record of `project`. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn release_all(&mut self, project: &str) -> Result<usize> {
        let released = transaction(&mut self.store, |state| {
            let now = Utc::now();
            let Some(entry) = state.projects.get_mut(project) else {
                return Ok(0);
            };
            let services: Vec<String> = entry
                .active_records()
                .map(|r| r.service_name().to_string())
                .collect();
            Ok(services
                .iter()
                .filter(|service| entry.deactivate(service, now))
                .count())
        })?;
        log::info!("released {released} service(s) of {project}");
        Ok(released)
    }

    /// Active records of `project`, by service name.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn project_ports(&mut self, project: &str) -> Result<BTreeMap<String, AllocatedPort>> {
        let state = self.store.load()?;
        Ok(state
            .projects
            .get(project)
            .map(|p| {
                p.active_records()
                    .map(|r| (r.service_name().to_string(), r.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Names of every project with a record.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn projects(&mut self) -> Result<Vec<String>> {
        Ok(self.store.load()?.projects.into_keys().collect())
    }

    /// Counts, port ownership and conflicts from a fresh scan.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn report(&mut self) -> Result<AllocationReport> {
        let state = self.store.load()?;
        self.checker.refresh();

        let ports: BTreeMap<u16, PortOwner> = state
            .active_records()
            .map(|r| {
                (
                    r.port().value(),
                    PortOwner {
                        project: r.project_name().to_string(),
                        service: r.service_name().to_string(),
                        service_type: r.service_type().to_string(),
                    },
                )
            })
            .collect();
        let active_ports: Vec<u16> = ports.keys().copied().collect();

        Ok(AllocationReport {
            generated_at: Utc::now(),
            projects: state.projects.len(),
            active: ports.len(),
            inactive: state.projects.values().map(|p| p.inactive_count()).sum(),
            conflicts: self.checker.conflicts(&active_ports),
            ports,
        })
    }

    /// Purges released and retired records. A deep cleanup also expires
    /// active records unused for longer than `max_age` and drops projects
    /// left empty.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn cleanup(&mut self, deep: bool, max_age: Duration) -> Result<CleanupReport> {
        let report = transaction(&mut self.store, |state| {
            Ok(purge(state, deep, max_age, Utc::now()))
        })?;
        log::info!(
            "cleanup removed {} record(s) and {} project(s)",
            report.purged.len(),
            report.removed_projects.len()
        );
        Ok(report)
    }
}

fn require_name<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation {
            field: field.into(),
            message: format!("{field} name must be non-empty"),
        });
    }
    Ok(trimmed)
}

/// Runs the allocation steps against one loaded state.
fn place<C: PortChecker>(
    state: &mut AllocationState,
    checker: &mut C,
    request: &Placement<'_>,
    now: DateTime<Utc>,
) -> Result<Option<AllocatedPort>> {
    let (project, service) = (request.project, request.service);

    if let Some(entry) = state.projects.get_mut(project) {
        let current = entry.active(service).map(AllocatedPort::port);
        if let Some(port) = current {
            if checker.is_available(port.value()) {
                if let Some(record) = entry.ports.get_mut(service) {
                    record.touch(now);
                    entry.updated_at = now;
                    return Ok(Some(record.clone()));
                }
            } else {
                log::warn!("{project}/{service}: port {port} is now in use; reallocating");
                entry.deactivate(service, now);
            }
        }
    }

    let ty = request.service_type;
    let mut tried = BTreeSet::new();
    let mut candidates: Vec<(u16, ConflictResolution)> = Vec::new();
    if let Some(port) = request.preferred {
        candidates.push((port.value(), ConflictResolution::Preferred));
    }
    if let Some(port) = ty.default_port {
        candidates.push((port, ConflictResolution::DefaultPort));
    }

    for (port, resolution) in candidates {
        if !tried.insert(port) {
            continue;
        }
        if let Some(record) = try_commit(state, checker, request, port, resolution, now)? {
            return Ok(Some(record));
        }
    }

    let searches = std::iter::once((ty.port_range, ConflictResolution::RangeSearch)).chain(
        request
            .extended
            .map(|range| (range, ConflictResolution::AutoResolvedExtendedRange)),
    );
    for (range, resolution) in searches {
        let mut attempts = 0;
        for port in range.iter().map(Port::value) {
            if attempts == MAX_RANGE_CANDIDATES {
                break;
            }
            if resolution == ConflictResolution::AutoResolvedExtendedRange
                && ty.port_range.contains_value(port)
            {
                continue;
            }
            if !tried.insert(port) || !allocatable(state, checker, port) {
                continue;
            }
            attempts += 1;
            if let Some(record) = try_commit(state, checker, request, port, resolution, now)? {
                return Ok(Some(record));
            }
        }
    }

    Ok(None)
}

fn allocatable<C: PortChecker>(state: &AllocationState, checker: &mut C, port: u16) -> bool {
    !state.is_claimed(port) && checker.is_available(port)
}

/// Commits `port` if it passes the claim check, the checker and a live
/// probe.
fn try_commit<C: PortChecker>(
    state: &mut AllocationState,
    checker: &mut C,
    request: &Placement<'_>,
    port: u16,
    resolution: ConflictResolution,
    now: DateTime<Utc>,
) -> Result<Option<AllocatedPort>> {
    if !allocatable(state, checker, port) {
        log::debug!("{}: {port} ({resolution}) unavailable", request.service);
        return Ok(None);
    }
    if !checker.verify(port) {
        log::debug!("{}: {port} failed live verification", request.service);
        return Ok(None);
    }

    let record = AllocatedPort::builder(request.project, request.service, Port::try_from(port)?)
        .service_type(request.service_type.name.clone())
        .resolution(resolution)
        .allocated_at(now)
        .build()?;
    state
        .project_mut(request.project, now)
        .insert(record.clone(), now);
    Ok(Some(record))
}

fn purge(
    state: &mut AllocationState,
    deep: bool,
    max_age: Duration,
    now: DateTime<Utc>,
) -> CleanupReport {
    let mut report = CleanupReport::default();
    let purged = |record: &AllocatedPort, reason| PurgedRecord {
        project: record.project_name().to_string(),
        service: record.service_name().to_string(),
        port: record.port().value(),
        reason,
    };

    for entry in state.projects.values_mut() {
        for record in entry.retired.drain(..) {
            report.purged.push(purged(&record, PurgeReason::Retired));
        }

        let before = entry.ports.len();
        entry.ports.retain(|_, record| {
            if !record.is_active() {
                report.purged.push(purged(record, PurgeReason::Released));
                return false;
            }
            if deep && record.is_stale(now, max_age) {
                report.purged.push(purged(record, PurgeReason::Expired));
                return false;
            }
            true
        });
        if entry.ports.len() != before {
            entry.updated_at = now;
        }
    }

    if deep {
        state.projects.retain(|name, entry| {
            let keep = !entry.ports.is_empty() || !entry.retired.is_empty();
            if !keep {
                report.removed_projects.push(name.clone());
            }
            keep
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::MockChecker;
    use crate::store::MemoryStore;

    type TestAllocator = PortAllocator<MemoryStore, MockChecker>;

    fn allocator(occupied: &[u16]) -> TestAllocator {
        PortAllocator::new(
            MemoryStore::new(),
            MockChecker::occupied(occupied.iter().copied()),
            ServiceRegistry::builtin(),
        )
    }

    fn port_of(record: &Option<AllocatedPort>) -> u16 {
        record.as_ref().unwrap().port().value()
    }

    #[test]
    fn test_default_port_first() {
        let mut alloc = allocator(&[]);
        let rec = alloc.allocate("p", "frontend", None, None, true).unwrap();
        assert_eq!(port_of(&rec), 3000);
        assert_eq!(
            rec.unwrap().conflict_resolution(),
            ConflictResolution::DefaultPort
        );
    }

    #[test]
    fn test_preferred_outside_range_is_honoured() {
        let mut alloc = allocator(&[]);
        let rec = alloc
            .allocate("p", "frontend", Some(4242), None, true)
            .unwrap()
            .unwrap();
        assert_eq!(rec.port().value(), 4242);
        assert_eq!(rec.conflict_resolution(), ConflictResolution::Preferred);
    }

    #[test]
    fn test_occupied_preferred_falls_through() {
        let mut alloc = allocator(&[3000]);
        let rec = alloc
            .allocate("p", "frontend", Some(3000), None, true)
            .unwrap()
            .unwrap();
        assert_eq!(rec.port().value(), 3001);
        assert_eq!(rec.conflict_resolution(), ConflictResolution::RangeSearch);
    }

    #[test]
    fn test_reuse_is_idempotent_and_touches() {
        let mut alloc = allocator(&[]);
        let first = alloc.allocate("p", "api", None, None, true).unwrap().unwrap();
        let second = alloc.allocate("p", "api", None, None, true).unwrap().unwrap();
        assert_eq!(first.port(), second.port());
        assert_eq!(first.allocated_at(), second.allocated_at());
        assert!(second.last_used() >= first.last_used());
    }

    #[test]
    fn test_cross_project_exclusivity() {
        let mut alloc = allocator(&[]);
        let a = alloc.allocate("a", "frontend", None, None, true).unwrap();
        let b = alloc.allocate("b", "frontend", None, None, true).unwrap();
        assert_eq!(port_of(&a), 3000);
        assert_eq!(port_of(&b), 3001);
    }

    #[test]
    fn test_preferred_claimed_by_other_project_is_skipped() {
        let mut alloc = allocator(&[]);
        alloc.allocate("a", "frontend", None, None, true).unwrap();
        let b = alloc.allocate("b", "web", Some(3000), None, true).unwrap();
        assert_ne!(port_of(&b), 3000);
    }

    #[test]
    fn test_self_healing_when_port_taken() {
        let mut alloc = allocator(&[]);
        let first = alloc.allocate("p", "frontend", None, None, true).unwrap();
        assert_eq!(port_of(&first), 3000);

        alloc.checker_mut().occupy(3000);
        let healed = alloc.allocate("p", "frontend", None, None, true).unwrap();
        assert_eq!(port_of(&healed), 3001);

        let state = alloc.store().snapshot();
        let project = &state.projects["p"];
        assert_eq!(project.retired.len(), 1);
        assert!(!project.retired[0].is_active());
        assert_eq!(project.retired[0].port().value(), 3000);
    }

    #[test]
    fn test_racing_port_skipped_by_live_verify() {
        let mut alloc = allocator(&[]);
        alloc.checker_mut().race(3000);
        alloc.checker_mut().race(3001);
        let rec = alloc.allocate("p", "frontend", None, None, true).unwrap();
        assert_eq!(port_of(&rec), 3002);
    }

    #[test]
    fn test_extended_range_when_type_range_full() {
        let occupied: Vec<u16> = (6380..=6399).collect();
        let mut alloc = allocator(&occupied);
        let rec = alloc
            .allocate("p", "redis", None, None, true)
            .unwrap()
            .unwrap();
        assert_eq!(rec.port().value(), 10000);
        assert_eq!(
            rec.conflict_resolution(),
            ConflictResolution::AutoResolvedExtendedRange
        );
    }

    #[test]
    fn test_exhaustion_without_auto_resolve_is_none() {
        let occupied: Vec<u16> = (6380..=6399).collect();
        let mut alloc = allocator(&occupied);
        let rec = alloc.allocate("p", "redis", None, None, false).unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn test_range_search_stops_after_max_candidates() {
        // every free candidate races, so the range gives up after five
        let mut alloc = allocator(&[]);
        for port in 3000..=3099 {
            alloc.checker_mut().race(port);
        }
        let rec = alloc.allocate("p", "frontend", None, None, false).unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn test_empty_names_rejected() {
        let mut alloc = allocator(&[]);
        assert!(alloc.allocate(" ", "web", None, None, true).is_err());
        assert!(alloc.allocate("p", "", None, None, true).is_err());
        assert!(alloc.allocate("p", "web", Some(0), None, true).is_err());
    }

    #[test]
    fn test_batch_sorted_by_priority_and_stable() {
        let mut alloc = allocator(&[]);
        let requests: Vec<ServiceRequest> =
            ["redis", "frontend", "backend", "postgres"].map(ServiceRequest::from).to_vec();
        let batch = alloc.allocate_batch("p", &requests).unwrap();
        let order: Vec<&str> = batch.allocated.iter().map(AllocatedPort::service_name).collect();
        assert_eq!(order, vec!["frontend", "backend", "postgres", "redis"]);
        assert!(batch.is_complete());
    }

    #[test]
    fn test_batch_reports_failures() {
        let occupied: Vec<u16> = (6380..=6399).collect();
        let mut alloc = allocator(&occupied).with_auto_resolve(false);
        let batch = alloc
            .allocate_batch("p", &["frontend".into(), "redis".into()])
            .unwrap();
        assert_eq!(batch.allocated.len(), 1);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].service, "redis");
        assert!(batch.failed[0].reason.contains("6380-6399"));
    }

    #[test]
    fn test_release_and_reallocate_creates_new_record() {
        let mut alloc = allocator(&[]);
        let first = alloc.allocate("p", "api", None, None, true).unwrap().unwrap();
        assert!(alloc.release("p", "api").unwrap());
        assert!(!alloc.release("p", "api").unwrap());
        assert!(alloc.project_ports("p").unwrap().is_empty());

        let second = alloc.allocate("p", "api", None, None, true).unwrap().unwrap();
        assert!(second.allocated_at() >= first.allocated_at());
        let state = alloc.store().snapshot();
        assert_eq!(state.projects["p"].retired.len(), 1);
    }

    #[test]
    fn test_release_all() {
        let mut alloc = allocator(&[]);
        alloc
            .allocate_batch("p", &["web".into(), "api".into()])
            .unwrap();
        assert_eq!(alloc.release_all("p").unwrap(), 2);
        assert_eq!(alloc.release_all("p").unwrap(), 0);
        assert_eq!(alloc.release_all("missing").unwrap(), 0);
    }

    #[test]
    fn test_report_counts_and_conflicts() {
        let mut alloc = allocator(&[]);
        alloc
            .allocate_batch("p", &["frontend".into(), "backend".into()])
            .unwrap();
        alloc.release("p", "backend").unwrap();
        alloc.checker_mut().occupy(3000);

        let report = alloc.report().unwrap();
        assert_eq!(report.projects, 1);
        assert_eq!(report.active, 1);
        assert_eq!(report.inactive, 1);
        assert_eq!(report.ports[&3000].service, "frontend");
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(alloc.checker_mut().refreshes(), 1);
    }

    #[test]
    fn test_cleanup_shallow_and_deep() {
        let mut alloc = allocator(&[]);
        alloc
            .allocate_batch("p", &["web".into(), "api".into()])
            .unwrap();
        alloc.allocate("q", "worker", None, None, true).unwrap();
        alloc.release("p", "api").unwrap();

        let shallow = alloc.cleanup(false, Duration::days(30)).unwrap();
        assert_eq!(shallow.count(PurgeReason::Released), 1);
        assert!(shallow.removed_projects.is_empty());
        assert_eq!(alloc.project_ports("p").unwrap().len(), 1);

        // everything is younger than a day, so a zero max age expires it all
        std::thread::sleep(std::time::Duration::from_millis(5));
        let deep = alloc.cleanup(true, Duration::zero()).unwrap();
        assert_eq!(deep.count(PurgeReason::Expired), 2);
        assert_eq!(deep.removed_projects, vec!["p".to_string(), "q".to_string()]);
        assert!(alloc.projects().unwrap().is_empty());
    }
}
