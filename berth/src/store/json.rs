//! Allocations record as one pretty-printed JSON file.
//!
//! Saves take an advisory lock file next to the record, re-read the stored
//! revision under the lock, and rename a fully written temp file into
//! place. Loads take no lock; a rename is atomic so readers see either the
//! old or the new record.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::allocation::AllocationState;
use crate::error::{Error, Result};

use super::{write_atomic, AllocationStore, DEFAULT_LOCK_TIMEOUT};

/// A lock file older than this is assumed abandoned.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// JSON file backend.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_timeout: Duration,
    stale_after: Duration,
}

impl JsonFileStore {
    /// Record file name inside a data directory.
    pub const FILE_NAME: &'static str = "allocations.json";

    /// A store at `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stale_after: STALE_LOCK_AGE,
        }
    }

    /// Sets how long a save waits for the lock.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the age after which a lock file is broken.
    #[must_use]
    pub const fn with_stale_after(mut self, age: Duration) -> Self {
        self.stale_after = age;
        self
    }

    /// The record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lock file, `<record>.lock`.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn read(&self) -> Result<AllocationState> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(AllocationState::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(AllocationState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn lock(&self) -> Result<LockGuard> {
        let path = self.lock_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| Error::Persistence {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(LockGuard { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(&path, self.stale_after) {
                        log::warn!("breaking stale store lock {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= self.lock_timeout {
                        return Err(Error::LockTimeout {
                            seconds: self.lock_timeout.as_secs(),
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(source) => return Err(Error::Persistence { path, source }),
            }
        }
    }
}

fn is_stale(lock: &Path, stale_after: Duration) -> bool {
    fs::metadata(lock)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}

/// Removes the lock file when dropped.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!("failed to remove lock {}: {e}", self.path.display());
        }
    }
}

impl AllocationStore for JsonFileStore {
    fn load(&mut self) -> Result<AllocationState> {
        self.read()
    }

    fn save(&mut self, state: &mut AllocationState) -> Result<()> {
        let _guard = self.lock()?;

        let stored = self.read()?.revision;
        if stored != state.revision {
            return Err(Error::ConcurrentModification {
                expected: state.revision,
                found: stored,
            });
        }

        state.revision += 1;
        let written = serde_json::to_vec_pretty(state)
            .map_err(Error::from)
            .and_then(|bytes| write_atomic(&self.path, &bytes));
        if written.is_err() {
            state.revision -= 1;
        }
        written
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}
