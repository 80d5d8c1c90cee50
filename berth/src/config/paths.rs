//! Data directory resolution.

use std::env;
use std::path::{Path, PathBuf};

use super::defaults::DATA_DIR_NAME;
use super::environment::ENV_DATA_DIR;
use super::schema::StorageScope;
use crate::error::{Error, Result};

/// `~/.berth`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    home::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .ok_or_else(|| Error::Validation {
            field: "home_directory".into(),
            message: "cannot determine home directory".into(),
        })
}

/// The global data directory: `$BERTH_DATA_DIR`, else `~/.berth`.
///
/// # Errors
///
/// Returns an error if neither is available.
pub fn global_data_dir() -> Result<PathBuf> {
    match env::var_os(ENV_DATA_DIR) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => default_data_dir(),
    }
}

/// Resolves where the store lives.
///
/// An explicit directory always wins. Otherwise the local scope uses
/// `<project_dir>/.berth` and the global scope [`global_data_dir`].
///
/// # Errors
///
/// Returns an error if the global directory cannot be determined.
pub fn resolve_data_dir(
    explicit: Option<&Path>,
    scope: StorageScope,
    project_dir: &Path,
) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    match scope {
        StorageScope::Local => Ok(project_dir.join(DATA_DIR_NAME)),
        StorageScope::Global => global_data_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_explicit_wins() {
        let dir = resolve_data_dir(
            Some(Path::new("/custom")),
            StorageScope::Local,
            Path::new("/work"),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/custom"));
    }

    #[test]
    fn test_local_scope() {
        let dir = resolve_data_dir(None, StorageScope::Local, Path::new("/work/app")).unwrap();
        assert_eq!(dir, PathBuf::from("/work/app/.berth"));
    }

    #[test]
    #[serial]
    fn test_global_scope_honours_env() {
        env::set_var(ENV_DATA_DIR, "/custom/data");
        let dir = resolve_data_dir(None, StorageScope::Global, Path::new("/work"));
        env::remove_var(ENV_DATA_DIR);
        assert_eq!(dir.unwrap(), PathBuf::from("/custom/data"));
    }

    #[test]
    #[serial]
    fn test_global_scope_defaults_to_home() {
        env::remove_var(ENV_DATA_DIR);
        if let Ok(dir) = global_data_dir() {
            assert!(dir.ends_with(".berth"));
        }
    }
}
