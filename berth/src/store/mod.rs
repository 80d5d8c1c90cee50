//! Durable storage for the allocations record.
//!
//! A store hands out the whole [`AllocationState`] and takes it back. Saves
//! are compare-and-set on [`AllocationState::revision`]: a writer whose
//! loaded revision is stale gets [`Error::ConcurrentModification`] and is
//! expected to reload and retry, which [`transaction`] does.
//!
//! # Examples
//!
//! ```
//! use berth::store::{transaction, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! let revision = transaction(&mut store, |state| Ok(state.revision)).unwrap();
//! assert_eq!(revision, 0);
//! assert_eq!(store.snapshot().revision, 1);
//! ```

mod json;
mod memory;
pub mod sqlite;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::allocation::AllocationState;
use crate::error::{Error, Result};

pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Attempts made by [`transaction`] before a contention error is surfaced.
pub const MAX_ATTEMPTS: usize = 3;

/// Default wait for the store lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent home of the allocations record.
pub trait AllocationStore {
    /// Reads the current record. A store that was never written yields the
    /// empty state at revision 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or parsed.
    fn load(&mut self) -> Result<AllocationState>;

    /// Writes `state` if nobody saved since it was loaded, then bumps its
    /// revision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentModification`] when the stored revision
    /// differs from `state.revision`, [`Error::LockTimeout`] when the lock
    /// cannot be taken, and [`Error::Persistence`] or [`Error::Database`]
    /// when the write itself fails.
    fn save(&mut self, state: &mut AllocationState) -> Result<()>;

    /// Where the record lives, for diagnostics.
    fn location(&self) -> String;

    /// Short backend name for diagnostics.
    fn backend_name(&self) -> &'static str;
}

impl<S: AllocationStore + ?Sized> AllocationStore for Box<S> {
    fn load(&mut self) -> Result<AllocationState> {
        (**self).load()
    }

    fn save(&mut self, state: &mut AllocationState) -> Result<()> {
        (**self).save(state)
    }

    fn location(&self) -> String {
        (**self).location()
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Runs one load-modify-save cycle, retrying on contention.
///
/// `f` runs against a freshly loaded state on every attempt, so it must not
/// carry decisions over from an earlier attempt.
///
/// # Errors
///
/// Returns whatever `f` returns, store errors, or the last contention error
/// once [`MAX_ATTEMPTS`] are used up.
pub fn transaction<S, T, F>(store: &mut S, mut f: F) -> Result<T>
where
    S: AllocationStore + ?Sized,
    F: FnMut(&mut AllocationState) -> Result<T>,
{
    let mut attempt = 1;
    loop {
        let mut state = store.load()?;
        let value = f(&mut state)?;
        match store.save(&mut state) {
            Ok(()) => return Ok(value),
            Err(e) if e.is_contention() && attempt < MAX_ATTEMPTS => {
                log::debug!("store contention on attempt {attempt}: {e}; retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Writes `bytes` to `path` through a temp file in the same directory and a
/// rename, creating the directory if needed.
///
/// # Errors
///
/// Returns [`Error::Persistence`] if any step fails; the temp file is
/// removed on failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let persist = |source: io::Error| Error::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(persist)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Validation {
            field: "path".into(),
            message: format!("{} has no file name", path.display()),
        })?;
    let tmp = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(persist(e));
    }
    Ok(())
}

/// Which persistent backend holds the allocations record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// `allocations.json`, locked and renamed into place.
    #[default]
    Json,
    /// `berth.db`.
    Sqlite,
}

impl StoreBackend {
    /// File name of the record inside the data directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Json => JsonFileStore::FILE_NAME,
            Self::Sqlite => SqliteStore::FILE_NAME,
        }
    }

    /// Opens the backend in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQLite database cannot be opened or has an
    /// incompatible schema. The JSON store opens lazily and never fails
    /// here.
    pub fn open(self, data_dir: &Path) -> Result<Box<dyn AllocationStore>> {
        let path: PathBuf = data_dir.join(self.file_name());
        Ok(match self {
            Self::Json => Box::new(JsonFileStore::new(path)),
            Self::Sqlite => Box::new(SqliteStore::open(path)?),
        })
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Validation {
                field: "storage.backend".into(),
                message: format!("unknown backend '{other}', expected json or sqlite"),
            }),
        }
    }
}
