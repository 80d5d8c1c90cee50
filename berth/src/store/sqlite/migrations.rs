//! Schema initialization and version checks.

use rusqlite::Connection;

use crate::error::{Error, Result};

use super::schema::{
    CREATE_ALLOCATIONS_TABLE, CREATE_METADATA_TABLE, CREATE_PORT_INDEX, CREATE_PROJECTS_TABLE,
    CREATE_PROJECT_INDEX, CURRENT_SCHEMA_VERSION, INSERT_SCHEMA_VERSION, SELECT_SCHEMA_VERSION,
};

/// Creates all tables and indices of a fresh database.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;
    conn.execute(CREATE_PROJECTS_TABLE, [])?;
    conn.execute(CREATE_ALLOCATIONS_TABLE, [])?;
    conn.execute(CREATE_PORT_INDEX, [])?;
    conn.execute(CREATE_PROJECT_INDEX, [])?;
    conn.execute(INSERT_SCHEMA_VERSION, [CURRENT_SCHEMA_VERSION])?;
    Ok(())
}

/// Reads the schema version; 0 means uninitialized.
///
/// # Errors
///
/// Returns an error if the query fails for any reason other than a missing
/// table or row.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let has_metadata: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'metadata'",
        [],
        |row| row.get(0),
    )?;
    if !has_metadata {
        return Ok(0);
    }

    match conn.query_row(SELECT_SCHEMA_VERSION, [], |row| row.get::<_, String>(0)) {
        Ok(value) => value.parse::<i32>().map_err(|e| Error::Validation {
            field: "schema_version".into(),
            message: format!("unreadable schema version '{value}': {e}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Initializes a fresh database or rejects one with another version.
///
/// # Errors
///
/// Returns [`Error::UnsupportedSchemaVersion`] when the stored version is
/// not [`CURRENT_SCHEMA_VERSION`], or a database error.
pub fn check_schema_compatibility(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;
    if version == 0 {
        log::debug!("initializing allocations schema v{CURRENT_SCHEMA_VERSION}");
        return initialize_schema(conn);
    }
    if version != CURRENT_SCHEMA_VERSION {
        return Err(Error::UnsupportedSchemaVersion {
            expected: CURRENT_SCHEMA_VERSION.unsigned_abs(),
            found: version.unsigned_abs(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_schema() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        check_schema_compatibility(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM allocations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_compatibility_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        check_schema_compatibility(&conn).unwrap();
        check_schema_compatibility(&conn).unwrap();
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(INSERT_SCHEMA_VERSION, [CURRENT_SCHEMA_VERSION + 1])
            .unwrap();

        let err = check_schema_compatibility(&conn).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchemaVersion { found: 2, .. }));
    }
}
