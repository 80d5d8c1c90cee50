//! SQLite backend for the allocations record.
//!
//! The record is normalized into `projects` and `allocations` rows; the
//! revision lives in `metadata`. A save runs in one IMMEDIATE transaction
//! that checks the revision, rewrites every row and bumps the revision, so
//! concurrent writers serialize on the database lock.
//!
//! # Examples
//!
//! ```no_run
//! use berth::store::{AllocationStore, SqliteStore};
//!
//! let mut store = SqliteStore::open("/tmp/berth.db").unwrap();
//! let mut state = store.load().unwrap();
//! store.save(&mut state).unwrap();
//! ```

pub mod migrations;
mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};

use crate::allocation::{AllocatedPort, AllocationState, ConflictResolution, ProjectPorts};
use crate::error::{Error, Result};
use crate::Port;

use schema::{
    DELETE_ALLOCATIONS, DELETE_PROJECTS, INSERT_ALLOCATION, INSERT_PROJECT, SELECT_ALLOCATIONS,
    SELECT_PROJECTS, SELECT_REVISION, UPSERT_REVISION,
};

pub use schema::CURRENT_SCHEMA_VERSION;

/// Default time a connection waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

/// One `allocations` row before it is folded into the state.
struct Row {
    project: String,
    service: String,
    service_type: String,
    port: u16,
    allocated_at: String,
    last_used: String,
    is_active: bool,
    conflict_resolution: String,
    retired: bool,
}

impl SqliteStore {
    /// Database file name inside a data directory.
    pub const FILE_NAME: &'static str = "berth.db";

    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be created, the
    /// pragmas cannot be applied, or the schema version is unsupported.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`SqliteStore::open`] with an explicit busy timeout.
    ///
    /// # Errors
    ///
    /// See [`SqliteStore::open`].
    pub fn open_with_timeout(path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&path, flags)?;

        // journal_mode returns a row
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL")?;
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {}",
            busy_timeout.as_millis()
        ))?;

        migrations::check_schema_compatibility(&conn)?;

        Ok(Self { conn, path })
    }

    /// The database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_revision(conn: &Connection) -> Result<u64> {
    let value: Option<String> = conn
        .query_row(SELECT_REVISION, [], |row| row.get(0))
        .optional()?;
    value.map_or(Ok(0), |v| {
        v.parse::<u64>().map_err(|e| Error::Validation {
            field: "revision".into(),
            message: format!("unreadable revision '{v}': {e}"),
        })
    })
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Validation {
            field: field.into(),
            message: format!("bad timestamp '{value}': {e}"),
        })
}

fn restore(row: Row) -> Result<AllocatedPort> {
    let resolution: ConflictResolution =
        row.conflict_resolution
            .parse()
            .map_err(|message| Error::Validation {
                field: "conflict_resolution".into(),
                message,
            })?;
    AllocatedPort::builder(row.project, row.service, Port::try_from(row.port)?)
        .service_type(row.service_type)
        .resolution(resolution)
        .allocated_at(parse_time("allocated_at", &row.allocated_at)?)
        .restore(parse_time("last_used", &row.last_used)?, row.is_active)
}

impl crate::store::AllocationStore for SqliteStore {
    fn load(&mut self) -> Result<AllocationState> {
        let mut state = AllocationState {
            revision: read_revision(&self.conn)?,
            ..AllocationState::default()
        };

        let mut stmt = self.conn.prepare(SELECT_PROJECTS)?;
        let projects = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for project in projects {
            let (name, created_at, updated_at) = project?;
            let mut entry = ProjectPorts::new(name.clone(), parse_time("created_at", &created_at)?);
            entry.updated_at = parse_time("updated_at", &updated_at)?;
            state.projects.insert(name, entry);
        }

        let mut stmt = self.conn.prepare(SELECT_ALLOCATIONS)?;
        let rows = stmt.query_map([], |row| {
            Ok(Row {
                project: row.get(0)?,
                service: row.get(1)?,
                service_type: row.get(2)?,
                port: row.get(3)?,
                allocated_at: row.get(4)?,
                last_used: row.get(5)?,
                is_active: row.get(6)?,
                conflict_resolution: row.get(7)?,
                retired: row.get(8)?,
            })
        })?;
        for row in rows {
            let row = row?;
            let retired = row.retired;
            let record = restore(row)?;
            let Some(project) = state.projects.get_mut(record.project_name()) else {
                return Err(Error::Validation {
                    field: "allocations.project".into(),
                    message: format!("record for unknown project '{}'", record.project_name()),
                });
            };
            if retired {
                project.retired.push(record);
            } else {
                project
                    .ports
                    .insert(record.service_name().to_string(), record);
            }
        }

        Ok(state)
    }

    fn save(&mut self, state: &mut AllocationState) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored = read_revision(&tx)?;
        if stored != state.revision {
            return Err(Error::ConcurrentModification {
                expected: state.revision,
                found: stored,
            });
        }

        tx.execute(DELETE_ALLOCATIONS, [])?;
        tx.execute(DELETE_PROJECTS, [])?;
        {
            let mut insert_project = tx.prepare(INSERT_PROJECT)?;
            let mut insert_allocation = tx.prepare(INSERT_ALLOCATION)?;
            for project in state.projects.values() {
                insert_project.execute(params![
                    project.project_name,
                    project.created_at.to_rfc3339(),
                    project.updated_at.to_rfc3339(),
                ])?;
                let current = project.ports.values().map(|r| (r, false));
                let retired = project.retired.iter().map(|r| (r, true));
                for (record, is_retired) in retired.chain(current) {
                    insert_allocation.execute(params![
                        record.project_name(),
                        record.service_name(),
                        record.service_type(),
                        record.port().value(),
                        record.allocated_at().to_rfc3339(),
                        record.last_used().to_rfc3339(),
                        record.is_active(),
                        record.conflict_resolution().to_string(),
                        is_retired,
                    ])?;
                }
            }
        }

        let next = state.revision + 1;
        tx.execute(UPSERT_REVISION, [next.to_string()])?;
        tx.commit()?;
        state.revision = next;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
