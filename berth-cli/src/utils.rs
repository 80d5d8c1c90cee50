//! Utility functions for CLI operations.
//!
//! Configuration loading, data directory and project resolution, opening
//! the [`Berth`] facade, and small output helpers shared by commands.

use std::env;
use std::path::{Path, PathBuf};

use berth::config::{resolve_data_dir, StorageConfig, StorageScope};
use berth::{Berth, Config, ConfigBuilder};
use chrono::{DateTime, Utc};
use clap::ValueEnum;

use crate::error::CliError;

/// Global CLI options shared across all commands.
#[derive(Debug, Clone, Default)]
#[allow(dead_code)] // `verbose` is consumed by the logger in main.rs
pub struct GlobalOptions {
    /// Enable verbose output.
    pub verbose: bool,

    /// Suppress non-essential output.
    pub quiet: bool,

    /// Override the data directory location.
    pub data_dir: Option<PathBuf>,

    /// Keep state in `<cwd>/.berth` instead of the global directory.
    pub local: bool,

    /// Project name override.
    pub project: Option<String>,

    /// Skip the primary engine.
    pub fallback: bool,
}

/// Tabular output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum TableFormat {
    /// Tab-separated table (human-readable)
    Table,
    /// JSON
    Json,
    /// CSV
    Csv,
}

/// Load layered configuration and apply global flags on top.
///
/// Precedence: flags > environment > project `berth.yaml` > user
/// `config.yaml` > defaults.
pub fn load_configuration(global: &GlobalOptions) -> Result<Config, CliError> {
    let cwd = env::current_dir()?;
    let mut builder = ConfigBuilder::new().with_working_dir(&cwd);
    if let Some(ref dir) = global.data_dir {
        builder = builder.with_data_dir(dir);
    }

    let mut overrides = Config::default();
    if global.fallback {
        overrides.force_fallback = Some(true);
    }
    if global.local {
        overrides.storage = Some(StorageConfig {
            scope: Some(StorageScope::Local),
            backend: None,
        });
    }

    builder
        .with_config(overrides)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

/// The data directory for `config`.
pub fn data_dir(global: &GlobalOptions, config: &Config) -> Result<PathBuf, CliError> {
    let cwd = env::current_dir()?;
    resolve_data_dir(global.data_dir.as_deref(), config.storage_scope(), &cwd)
        .map_err(|e| CliError::Config(e.to_string()))
}

/// Load configuration and open the facade. A primary engine that cannot
/// be built is reported by the library's warning log.
pub fn open_berth(global: &GlobalOptions) -> Result<Berth, CliError> {
    let config = load_configuration(global)?;
    let dir = data_dir(global, &config)?;
    Ok(Berth::open(config, dir))
}

/// The project to act on: `--project`, then configuration, then the name
/// of the current directory.
pub fn resolve_project(global: &GlobalOptions, config: &Config) -> Result<String, CliError> {
    if let Some(ref project) = global.project {
        return non_empty(project);
    }
    if let Some(ref project) = config.project {
        return non_empty(project);
    }
    let cwd = env::current_dir()?;
    cwd.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CliError::InvalidArguments(
                "cannot derive a project name from the current directory; pass --project".into(),
            )
        })
}

fn non_empty(project: &str) -> Result<String, CliError> {
    let trimmed = project.trim();
    if trimmed.is_empty() {
        Err(CliError::InvalidArguments("project name cannot be empty".into()))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a `service=port` pair.
pub fn parse_preference(s: &str) -> Result<(String, u16), String> {
    let (service, port) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SERVICE=PORT, got '{s}'"))?;
    let service = service.trim();
    if service.is_empty() {
        return Err(format!("missing service name in '{s}'"));
    }
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| format!("invalid port in '{s}'"))?;
    if port == 0 {
        return Err("port 0 is invalid".into());
    }
    Ok((service.to_string(), port))
}

/// Format a timestamp for display.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Shorten a path for display.
///
/// If the path is within the home directory, show it as ~/...
/// Otherwise, show the full path.
pub fn shorten_path(path: &Path) -> String {
    if let Some(home) = home::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

/// The directory artifacts go to: `--output`, else the current directory.
pub fn output_dir(output: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match output {
        Some(dir) => Ok(dir),
        None => Ok(env::current_dir()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();
        assert_eq!(format_timestamp(ts), "2024-01-15 10:30:45");
    }

    #[test]
    fn test_shorten_path_outside_home() {
        let path = PathBuf::from("/usr/local/bin");
        assert_eq!(shorten_path(&path), "/usr/local/bin");
    }

    #[test]
    fn test_parse_preference() {
        assert_eq!(parse_preference("api=8050").unwrap(), ("api".into(), 8050));
        assert_eq!(parse_preference(" web = 3001 ").unwrap(), ("web".into(), 3001));
        assert!(parse_preference("api").is_err());
        assert!(parse_preference("=8000").is_err());
        assert!(parse_preference("api=0").is_err());
        assert!(parse_preference("api=99999").is_err());
    }

    #[test]
    fn test_explicit_project_wins() {
        let global = GlobalOptions {
            project: Some(" shop ".into()),
            ..GlobalOptions::default()
        };
        let config = Config {
            project: Some("other".into()),
            ..Config::default()
        };
        assert_eq!(resolve_project(&global, &config).unwrap(), "shop");
    }
}
