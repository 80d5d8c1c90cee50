//! Layered configuration assembly.

use std::path::{Path, PathBuf};

use super::environment::EnvironmentConfig;
use super::loader::ConfigLoader;
use super::merger::ConfigMerger;
use super::paths::global_data_dir;
use super::schema::Config;
use super::validator::ConfigValidator;
use crate::error::Result;

/// Builds a [`Config`] from files, environment and programmatic overrides.
///
/// # Examples
///
/// ```
/// use berth::config::{Config, ConfigBuilder};
///
/// let config = ConfigBuilder::new()
///     .skip_files()
///     .skip_env()
///     .with_config(Config {
///         project: Some("demo".into()),
///         ..Config::default()
///     })
///     .build()
///     .unwrap();
/// assert_eq!(config.project.as_deref(), Some("demo"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    working_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    skip_files: bool,
    skip_env: bool,
    overrides: Option<Config>,
}

impl ConfigBuilder {
    /// A builder that reads everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Where to start looking for `berth.yaml` (defaults to the current
    /// directory).
    #[must_use]
    pub fn with_working_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    /// Where the user `config.yaml` lives (defaults to the global data
    /// directory).
    #[must_use]
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.data_dir = Some(dir.to_path_buf());
        self
    }

    /// Ignores configuration files.
    #[must_use]
    pub const fn skip_files(mut self) -> Self {
        self.skip_files = true;
        self
    }

    /// Ignores `BERTH_*` variables.
    #[must_use]
    pub const fn skip_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Applies `config` on top of every other source.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.overrides = Some(config);
        self
    }

    /// Loads, merges and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be parsed, an environment variable
    /// is malformed, or the merged result fails validation.
    pub fn build(self) -> Result<Config> {
        let mut config = if self.skip_files {
            Config::default()
        } else {
            let working_dir = match self.working_dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let data_dir = self.data_dir.or_else(|| global_data_dir().ok());
            let sources = ConfigLoader::load_all(&working_dir, data_dir.as_deref())?;
            for source in &sources {
                log::debug!("loaded configuration from {}", source.path.display());
            }
            ConfigMerger::merge(sources)
        };

        if !self.skip_env {
            EnvironmentConfig::apply_overrides(&mut config)?;
        }
        if let Some(ref overrides) = self.overrides {
            ConfigMerger::merge_into(&mut config, overrides);
        }

        ConfigValidator::validate(&config)?;
        Ok(config)
    }
}
