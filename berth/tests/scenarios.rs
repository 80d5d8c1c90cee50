//! End-to-end allocation scenarios against an in-memory store.

mod common;

use berth::registry::ServiceType;
use berth::scanner::MockChecker;
use berth::store::MemoryStore;
use berth::{ConflictResolution, PortAllocator, PortRange, ServiceRegistry, ServiceRequest};
use common::{all_distinct, memory_allocator};

fn requests(names: &[&str]) -> Vec<ServiceRequest> {
    names.iter().map(|n| ServiceRequest::from(*n)).collect()
}

#[test]
fn test_fresh_project_gets_distinct_offset_ports() {
    let mut allocator = memory_allocator(&[]);
    let batch = allocator
        .allocate_batch("demo", &requests(&["frontend", "backend", "mongodb"]))
        .unwrap();

    assert!(batch.is_complete());
    let ports: Vec<u16> = batch.allocated.iter().map(|r| r.port().value()).collect();
    assert_eq!(ports.len(), 3);
    assert!(all_distinct(&ports));

    let mongo = batch.port_of("mongodb").unwrap();
    assert_ne!(mongo, 27017);
    assert!((3000..4000).contains(&batch.port_of("frontend").unwrap()));
}

#[test]
fn test_repeat_allocation_reuses_ports() {
    let mut allocator = memory_allocator(&[]);
    let names = requests(&["frontend", "backend", "mongodb"]);
    let first = allocator.allocate_batch("demo", &names).unwrap();
    let second = allocator.allocate_batch("demo", &names).unwrap();

    for service in ["frontend", "backend", "mongodb"] {
        assert_eq!(first.port_of(service), second.port_of(service), "{service}");
    }
    assert_eq!(allocator.report().unwrap().inactive, 0);
}

#[test]
fn test_taken_port_is_reallocated() {
    let mut allocator = memory_allocator(&[]);
    let names = requests(&["frontend", "backend", "mongodb"]);
    let first = allocator.allocate_batch("demo", &names).unwrap();
    let old_backend = first.port_of("backend").unwrap();

    allocator.checker_mut().occupy(old_backend);
    let again = allocator
        .allocate("demo", "backend", None, None, true)
        .unwrap()
        .unwrap();

    assert_ne!(again.port().value(), old_backend);
    let ports = allocator.project_ports("demo").unwrap();
    let active: Vec<u16> = ports.values().map(|r| r.port().value()).collect();
    assert!(all_distinct(&active));
    assert_eq!(ports["backend"].port(), again.port());

    let report = allocator.report().unwrap();
    assert_eq!(report.inactive, 1);
    assert!(!report.ports.contains_key(&old_backend));
}

#[test]
fn test_oversubscribed_batch_reports_every_service() {
    let mut registry = ServiceRegistry::builtin();
    registry
        .insert(ServiceType {
            name: "tiny".into(),
            port_range: PortRange::from_bounds(7000, 7014).unwrap(),
            default_port: None,
            priority: 5,
            port_alternatives: Vec::new(),
            description: "fifteen ports".into(),
        })
        .unwrap();
    let mut allocator = PortAllocator::new(MemoryStore::new(), MockChecker::new(), registry)
        .with_extended_range(PortRange::from_bounds(7100, 7102).unwrap())
        .with_auto_resolve(true);

    let services: Vec<ServiceRequest> = (0..20)
        .map(|i| ServiceRequest::new(format!("job-{i}")).with_type("tiny"))
        .collect();
    let batch = allocator.allocate_batch("batchy", &services).unwrap();

    assert_eq!(batch.allocated.len() + batch.failed.len(), 20);
    let in_range = batch
        .allocated
        .iter()
        .filter(|r| r.conflict_resolution() == ConflictResolution::RangeSearch)
        .count();
    let extended = batch
        .allocated
        .iter()
        .filter(|r| r.conflict_resolution() == ConflictResolution::AutoResolvedExtendedRange)
        .count();
    assert_eq!(in_range, 15);
    assert_eq!(extended, 3);
    assert_eq!(batch.failed.len(), 2);
    assert!(batch.failed.iter().all(|f| f.reason.contains("7000-7014")));

    let ports: Vec<u16> = batch.allocated.iter().map(|r| r.port().value()).collect();
    assert!(all_distinct(&ports));
}

#[test]
fn test_projects_never_share_ports() {
    let mut allocator = memory_allocator(&[3000]);
    let names = requests(&["frontend", "backend", "postgres", "redis"]);
    let a = allocator.allocate_batch("alpha", &names).unwrap();
    let b = allocator.allocate_batch("beta", &names).unwrap();

    let mut ports: Vec<u16> = a.allocated.iter().map(|r| r.port().value()).collect();
    ports.extend(b.allocated.iter().map(|r| r.port().value()));
    assert_eq!(ports.len(), 8);
    assert!(all_distinct(&ports));
    assert!(!ports.contains(&3000));
}

#[test]
fn test_release_is_soft_until_cleanup() {
    let mut allocator = memory_allocator(&[]);
    allocator
        .allocate_batch("demo", &requests(&["frontend", "backend"]))
        .unwrap();

    assert!(allocator.release("demo", "backend").unwrap());
    assert!(!allocator.release("demo", "backend").unwrap());
    assert_eq!(allocator.project_ports("demo").unwrap().len(), 1);

    let state = allocator.store().snapshot();
    assert!(!state.projects["demo"].ports["backend"].is_active());

    let cleaned = allocator.cleanup(false, chrono::Duration::days(30)).unwrap();
    assert_eq!(cleaned.purged.len(), 1);
    assert_eq!(cleaned.purged[0].service, "backend");
    assert!(!allocator.store().snapshot().projects["demo"]
        .ports
        .contains_key("backend"));
}

#[test]
fn test_preferred_port_wins_when_free() {
    let mut allocator = memory_allocator(&[]);
    let batch = allocator
        .allocate_batch("demo", &[ServiceRequest::new("frontend").prefer(3050)])
        .unwrap();
    let record = &batch.allocated[0];
    assert_eq!(record.port().value(), 3050);
    assert_eq!(record.conflict_resolution(), ConflictResolution::Preferred);
}
