//! Configuration file discovery and loading.

use std::fs;
use std::path::{Path, PathBuf};

use super::defaults::{PROJECT_CONFIG_FILE, USER_CONFIG_FILE};
use super::schema::Config;
use crate::error::{Error, Result};

/// A parsed configuration file with its precedence.
///
/// Lower precedence values are overridden by higher ones.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path of the file.
    pub path: PathBuf,
    /// Precedence level (higher values take priority).
    pub precedence: u8,
    /// Parsed configuration.
    pub config: Config,
}

/// Loads configuration files.
///
/// # Examples
///
/// ```no_run
/// use berth::config::ConfigLoader;
/// use std::path::Path;
///
/// let sources = ConfigLoader::load_all(Path::new("."), Some(Path::new("/home/me/.berth"))).unwrap();
/// println!("found {} configuration files", sources.len());
/// ```
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the user config from `data_dir` (precedence 1) and the nearest
    /// project `berth.yaml` at or above `working_dir` (precedence 2). No
    /// user config is read when `data_dir` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed.
    pub fn load_all(working_dir: &Path, data_dir: Option<&Path>) -> Result<Vec<ConfigSource>> {
        let mut sources = Vec::new();

        let user = data_dir.map(|dir| dir.join(USER_CONFIG_FILE));
        if let Some(user) = user.filter(|path| path.is_file()) {
            sources.push(ConfigSource {
                config: Self::load_file(&user)?,
                path: user,
                precedence: 1,
            });
        }

        if let Some(project) = Self::find_project_config(working_dir) {
            sources.push(ConfigSource {
                config: Self::load_file(&project)?,
                path: project,
                precedence: 2,
            });
        }

        sources.sort_by_key(|s| s.precedence);
        Ok(sources)
    }

    /// The nearest `berth.yaml` at or above `start_dir`.
    #[must_use]
    pub fn find_project_config(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(PROJECT_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Reads and parses one YAML file. An empty file is an empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the YAML is invalid.
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&contents).map_err(|e| Error::Validation {
            field: path.display().to_string(),
            message: format!("invalid YAML: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_file() {
        assert!(ConfigLoader::load_file(Path::new("/nonexistent/berth.yaml")).is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "scan: [unclosed").unwrap();
        let err = ConfigLoader::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_empty_file_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("berth.yaml");
        fs::write(&path, "\n").unwrap();
        assert_eq!(ConfigLoader::load_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_project_config_found_walking_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("berth.yaml"), "project: outer\n").unwrap();

        let found = ConfigLoader::find_project_config(&nested).unwrap();
        assert_eq!(found, dir.path().join("berth.yaml"));
    }

    #[test]
    fn test_load_all_orders_by_precedence() {
        let data = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        fs::write(data.path().join("config.yaml"), "project: user\n").unwrap();
        fs::write(work.path().join("berth.yaml"), "project: local\n").unwrap();

        let sources = ConfigLoader::load_all(work.path(), Some(data.path())).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].config.project.as_deref(), Some("user"));
        assert_eq!(sources[1].config.project.as_deref(), Some("local"));
    }
}
