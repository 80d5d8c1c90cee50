//! Persistence through the file-backed stores.

mod common;

use berth::scanner::MockChecker;
use berth::store::{transaction, AllocationStore, JsonFileStore, SqliteStore};
use berth::{Error, PortAllocator, ServiceRegistry, ServiceRequest, StoreBackend};
use common::all_distinct;
use tempfile::TempDir;

fn allocate_in<S: AllocationStore>(store: S, project: &str) -> Vec<u16> {
    let mut allocator = PortAllocator::new(store, MockChecker::new(), ServiceRegistry::builtin());
    let batch = allocator
        .allocate_batch(
            project,
            &[ServiceRequest::from("frontend"), ServiceRequest::from("postgres")],
        )
        .unwrap();
    batch.allocated.iter().map(|r| r.port().value()).collect()
}

#[test]
fn test_json_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("allocations.json");

    let first = allocate_in(JsonFileStore::new(&path), "demo");
    let again = allocate_in(JsonFileStore::new(&path), "demo");
    assert_eq!(first, again);

    let other = allocate_in(JsonFileStore::new(&path), "other");
    let mut all = first.clone();
    all.extend(other);
    assert!(all_distinct(&all));

    assert!(!JsonFileStore::new(&path).lock_path().exists());
}

#[test]
fn test_sqlite_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("berth.db");

    let first = allocate_in(SqliteStore::open(&path).unwrap(), "demo");
    let again = allocate_in(SqliteStore::open(&path).unwrap(), "demo");
    assert_eq!(first, again);

    let mut store = SqliteStore::open(&path).unwrap();
    let state = store.load().unwrap();
    assert_eq!(state.projects["demo"].ports.len(), 2);
    assert!(state.revision >= 2);
}

#[test]
fn test_stale_revision_is_rejected() {
    for backend in [StoreBackend::Json, StoreBackend::Sqlite] {
        let dir = TempDir::new().unwrap();
        let mut a = backend.open(dir.path()).unwrap();
        let mut b = backend.open(dir.path()).unwrap();

        let mut from_a = a.load().unwrap();
        let mut from_b = b.load().unwrap();
        a.save(&mut from_a).unwrap();

        let err = b.save(&mut from_b).unwrap_err();
        assert!(
            matches!(err, Error::ConcurrentModification { .. }),
            "{backend}: {err}"
        );
        assert!(err.is_contention());
    }
}

#[test]
fn test_transaction_retries_after_contention() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("allocations.json");
    let mut store = JsonFileStore::new(&path);
    let mut rival = JsonFileStore::new(&path);

    let mut calls = 0;
    let revision = transaction(&mut store, |state| {
        calls += 1;
        if calls == 1 {
            let mut theirs = rival.load()?;
            rival.save(&mut theirs)?;
        }
        Ok(state.revision)
    })
    .unwrap();

    assert_eq!(calls, 2);
    assert_eq!(revision, 1);
    assert_eq!(store.load().unwrap().revision, 2);
}
