//! SQL for the SQLite allocations store.

/// Schema version stored in the metadata table.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Key-value metadata: schema version and record revision.
pub const CREATE_METADATA_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    )";

/// One row per project.
pub const CREATE_PROJECTS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS projects (
        name TEXT PRIMARY KEY NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )";

/// Every allocation record, current and retired.
///
/// `(project, service)` is not unique: retired records keep their row until
/// cleanup. Uniqueness of active ports is enforced by the allocator.
pub const CREATE_ALLOCATIONS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS allocations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project TEXT NOT NULL REFERENCES projects(name),
        service TEXT NOT NULL,
        service_type TEXT NOT NULL,
        port INTEGER NOT NULL,
        allocated_at TEXT NOT NULL,
        last_used TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        conflict_resolution TEXT NOT NULL,
        retired INTEGER NOT NULL DEFAULT 0
    )";

/// Speeds up claimant lookups.
pub const CREATE_PORT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_allocations_port ON allocations(port)";

/// Speeds up per-project reads.
pub const CREATE_PROJECT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_allocations_project ON allocations(project)";

pub const SELECT_SCHEMA_VERSION: &str = "SELECT value FROM metadata WHERE key = 'schema_version'";

pub const INSERT_SCHEMA_VERSION: &str =
    "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)";

pub const SELECT_REVISION: &str = "SELECT value FROM metadata WHERE key = 'revision'";

pub const UPSERT_REVISION: &str =
    "INSERT OR REPLACE INTO metadata (key, value) VALUES ('revision', ?)";

pub const SELECT_PROJECTS: &str = "SELECT name, created_at, updated_at FROM projects ORDER BY name";

pub const SELECT_ALLOCATIONS: &str = r"
    SELECT project, service, service_type, port, allocated_at, last_used,
           is_active, conflict_resolution, retired
    FROM allocations
    ORDER BY id
";

pub const INSERT_PROJECT: &str =
    "INSERT INTO projects (name, created_at, updated_at) VALUES (?, ?, ?)";

pub const INSERT_ALLOCATION: &str = r"
    INSERT INTO allocations
    (project, service, service_type, port, allocated_at, last_used,
     is_active, conflict_resolution, retired)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";

pub const DELETE_ALLOCATIONS: &str = "DELETE FROM allocations";

pub const DELETE_PROJECTS: &str = "DELETE FROM projects";
