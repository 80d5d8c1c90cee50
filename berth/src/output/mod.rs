//! Artifact generation.
//!
//! An [`ArtifactGenerator`] turns one project's allocations into the files
//! a local stack consumes: `.env`, `ports.sh`, `ports.json` and
//! `docker-compose.yml`. Each file comes from an [`OutputFormatter`].
//!
//! When the compose serializer is unavailable (see
//! [`ArtifactFormat::probe`]) or fails, the compose file is written by a
//! minimal built-in YAML writer and a `docker-compose.json` copy is added.

mod compose;
mod formatters;
mod shell;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::allocation::AllocatedPort;
use crate::registry::ServiceDefinition;
use crate::store::write_atomic;
use crate::Result;

pub use compose::{write_minimal_yaml, ComposeFile, ComposeFormatter, ComposeService, STATEFUL_DEFAULTS};
pub use formatters::{
    compose_project_name, port_var_name, EnvFormatter, ExportFormatter, HumanFormatter,
    JsonFormatter, COMPOSE_PROJECT_VAR,
};
pub use shell::ShellType;

/// Renders a project's allocations, keyed by service name.
pub trait OutputFormatter {
    /// Formats `allocations` of `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if a service name cannot be expressed in the
    /// format or serialization fails.
    fn format(&self, project: &str, allocations: &BTreeMap<String, AllocatedPort>) -> Result<String>;
}

/// Kinds of artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// `.env`
    Env,
    /// `ports.sh`
    Shell,
    /// `ports.json`
    Json,
    /// `docker-compose.yml`
    Compose,
}

impl ArtifactFormat {
    /// Every format, in generation order.
    pub const ALL: [Self; 4] = [Self::Env, Self::Shell, Self::Json, Self::Compose];

    /// File written for this format.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Env => ".env",
            Self::Shell => "ports.sh",
            Self::Json => "ports.json",
            Self::Compose => "docker-compose.yml",
        }
    }

    /// Formats whose serializer works in this build.
    ///
    /// Env and shell output are plain text and always available; JSON and
    /// compose are checked by serializing a small sample.
    #[must_use]
    pub fn probe() -> Vec<Self> {
        let sample = BTreeMap::from([("probe", 1u16)]);
        let mut formats = vec![Self::Env, Self::Shell];
        if serde_json::to_string(&sample).is_ok() {
            formats.push(Self::Json);
        }
        if serde_yaml::to_string(&sample).is_ok() {
            formats.push(Self::Compose);
        }
        formats
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Env => "env",
            Self::Shell => "shell",
            Self::Json => "json",
            Self::Compose => "compose",
        })
    }
}

/// Files written by [`ArtifactGenerator::generate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifacts {
    /// Paths written, in generation order.
    pub files: Vec<PathBuf>,
    /// Formats produced by a substitute writer.
    pub degraded: Vec<ArtifactFormat>,
}

impl GeneratedArtifacts {
    /// The path written for `format`'s file name, if any.
    #[must_use]
    pub fn path_of(&self, format: ArtifactFormat) -> Option<&Path> {
        self.files
            .iter()
            .find(|p| p.file_name().is_some_and(|n| n == format.file_name()))
            .map(PathBuf::as_path)
    }
}

/// Writes artifacts for one project.
///
/// # Examples
///
/// ```
/// use berth::output::{ArtifactFormat, ArtifactGenerator};
/// use berth::{AllocatedPort, Port};
///
/// let web = AllocatedPort::builder("shop", "web", Port::try_from(3000).unwrap())
///     .service_type("frontend")
///     .build()
///     .unwrap();
/// let dir = tempfile::tempdir().unwrap();
///
/// let written = ArtifactGenerator::new("shop", [web]).generate(dir.path()).unwrap();
/// assert_eq!(written.files.len(), 4);
/// let env = std::fs::read_to_string(written.path_of(ArtifactFormat::Env).unwrap()).unwrap();
/// assert!(env.contains("WEB_PORT=3000"));
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    project: String,
    allocations: BTreeMap<String, AllocatedPort>,
    definitions: Vec<ServiceDefinition>,
    shell: ShellType,
    serializers: Vec<ArtifactFormat>,
}

impl ArtifactGenerator {
    /// A generator for `project`'s active `allocations`.
    pub fn new(project: impl Into<String>, allocations: impl IntoIterator<Item = AllocatedPort>) -> Self {
        Self {
            project: project.into(),
            allocations: allocations
                .into_iter()
                .filter(AllocatedPort::is_active)
                .map(|r| (r.service_name().to_string(), r))
                .collect(),
            definitions: Vec::new(),
            shell: ShellType::Bash,
            serializers: ArtifactFormat::probe(),
        }
    }

    /// Template definitions for the compose file.
    #[must_use]
    pub fn with_definitions(mut self, definitions: Vec<ServiceDefinition>) -> Self {
        self.definitions = definitions;
        self
    }

    /// Dialect of `ports.sh`.
    #[must_use]
    pub const fn with_shell(mut self, shell: ShellType) -> Self {
        self.shell = shell;
        self
    }

    /// Serializers to trust, normally [`crate::scanner::Capabilities::serializers`].
    #[must_use]
    pub fn with_serializers(mut self, serializers: Vec<ArtifactFormat>) -> Self {
        self.serializers = serializers;
        self
    }

    /// Allocations being written, by service.
    #[must_use]
    pub const fn allocations(&self) -> &BTreeMap<String, AllocatedPort> {
        &self.allocations
    }

    /// Renders one format in memory.
    ///
    /// # Errors
    ///
    /// Returns the formatter's error; compose serialization failure is
    /// [`crate::Error::ArtifactFormatUnavailable`].
    pub fn render(&self, format: ArtifactFormat) -> Result<String> {
        let formatter: Box<dyn OutputFormatter> = match format {
            ArtifactFormat::Env => Box::new(EnvFormatter),
            ArtifactFormat::Shell => Box::new(ExportFormatter::new(self.shell)),
            ArtifactFormat::Json => Box::new(JsonFormatter),
            ArtifactFormat::Compose => Box::new(ComposeFormatter::new(self.definitions.clone())),
        };
        formatter.format(&self.project, &self.allocations)
    }

    /// Writes every artifact into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for a service name that cannot
    /// become a variable name, and [`crate::Error::Persistence`] if a file
    /// cannot be written.
    pub fn generate(&self, dir: &Path) -> Result<GeneratedArtifacts> {
        let mut written = GeneratedArtifacts::default();
        for format in ArtifactFormat::ALL {
            let path = dir.join(format.file_name());
            if format == ArtifactFormat::Compose {
                self.write_compose(dir, &mut written)?;
                continue;
            }
            let content = if format == ArtifactFormat::Json && !self.serializers.contains(&format) {
                written.degraded.push(format);
                self.minimal_json()
            } else {
                self.render(format)?
            };
            write_atomic(&path, content.as_bytes())?;
            written.files.push(path);
        }
        log::info!(
            "wrote {} artifact(s) for {} to {}",
            written.files.len(),
            self.project,
            dir.display()
        );
        Ok(written)
    }

    fn write_compose(&self, dir: &Path, written: &mut GeneratedArtifacts) -> Result<()> {
        let path = dir.join(ArtifactFormat::Compose.file_name());
        let native = if self.serializers.contains(&ArtifactFormat::Compose) {
            match self.render(ArtifactFormat::Compose) {
                Ok(yaml) => Some(yaml),
                Err(e) => {
                    log::warn!("{e}; using the built-in YAML writer");
                    None
                }
            }
        } else {
            None
        };

        if let Some(yaml) = native {
            write_atomic(&path, yaml.as_bytes())?;
            written.files.push(path);
            return Ok(());
        }

        let document = ComposeFile::build(&self.allocations, &self.definitions);
        write_atomic(&path, write_minimal_yaml(&document).as_bytes())?;
        written.files.push(path);
        written.degraded.push(ArtifactFormat::Compose);

        let json_copy = dir.join("docker-compose.json");
        let json = serde_json::to_string_pretty(&document)?;
        write_atomic(&json_copy, json.as_bytes())?;
        written.files.push(json_copy);
        Ok(())
    }

    fn minimal_json(&self) -> String {
        let services: Vec<String> = self
            .allocations
            .iter()
            .map(|(name, r)| format!("    \"{}\": {}", name.replace('"', "\\\""), r.port().value()))
            .collect();
        format!(
            "{{\n  \"project\": \"{}\",\n  \"ports\": {{\n{}\n  }}\n}}\n",
            self.project.replace('"', "\\\""),
            services.join(",\n")
        )
    }
}
