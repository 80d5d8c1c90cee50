//! Compose file generation.
//!
//! Every allocated service becomes a compose service publishing
//! `host_port:internal_port`. Services without a template definition get
//! one from [`STATEFUL_DEFAULTS`] when their type is a known data store,
//! otherwise a `build: ./<service>` entry listening on the host port.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::allocation::AllocatedPort;
use crate::registry::ServiceDefinition;
use crate::{Error, Result};

use super::OutputFormatter;

/// `(service type, image, container port, data directory)` for data stores.
pub const STATEFUL_DEFAULTS: &[(&str, &str, u16, &str)] = &[
    ("postgres", "postgres:16-alpine", 5432, "/var/lib/postgresql/data"),
    ("mysql", "mysql:8", 3306, "/var/lib/mysql"),
    ("mongodb", "mongo:7", 27017, "/data/db"),
    ("redis", "redis:7-alpine", 6379, "/data"),
    ("elasticsearch", "elasticsearch:8.13.4", 9200, "/usr/share/elasticsearch/data"),
    ("rabbitmq", "rabbitmq:3-management", 5672, "/var/lib/rabbitmq"),
    ("kafka", "bitnami/kafka:3.7", 9092, "/bitnami/kafka"),
];

/// One compose service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeService {
    /// Image to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build context when there is no image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// `host:container` mappings.
    pub ports: Vec<String>,
    /// Container environment.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Volume mounts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Start-order dependencies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// A whole compose document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposeFile {
    /// Services by name.
    pub services: BTreeMap<String, ComposeService>,
    /// Named volumes.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, BTreeMap<String, String>>,
}

impl ComposeFile {
    /// Builds the document for `allocations`, using `definitions` where a
    /// service has one. Dependencies on services that are not allocated are
    /// dropped with a warning.
    #[must_use]
    pub fn build(
        allocations: &BTreeMap<String, AllocatedPort>,
        definitions: &[ServiceDefinition],
    ) -> Self {
        let mut file = Self::default();
        for (name, record) in allocations {
            let definition = definitions
                .iter()
                .find(|d| &d.name == name)
                .cloned()
                .unwrap_or_else(|| default_definition(name, record));

            let host = record.port().value();
            let internal = definition.internal_port.unwrap_or(host);
            let depends_on = definition
                .depends_on
                .iter()
                .filter(|dep| {
                    let present = allocations.contains_key(dep.as_str());
                    if !present {
                        log::warn!("{name}: dropping dependency on unallocated service '{dep}'");
                    }
                    present
                })
                .cloned()
                .collect();
            for volume in definition.named_volumes() {
                file.volumes.insert(volume.to_string(), BTreeMap::new());
            }

            file.services.insert(
                name.clone(),
                ComposeService {
                    build: definition
                        .image
                        .is_none()
                        .then(|| format!("./{name}")),
                    image: definition.image.clone(),
                    ports: vec![format!("{host}:{internal}")],
                    environment: definition.environment.clone(),
                    volumes: definition.volumes.clone(),
                    depends_on,
                },
            );
        }
        file
    }
}

fn default_definition(name: &str, record: &AllocatedPort) -> ServiceDefinition {
    let base = ServiceDefinition::new(name, record.service_type());
    match STATEFUL_DEFAULTS
        .iter()
        .find(|(ty, ..)| *ty == record.service_type())
    {
        Some((_, image, port, data)) => base
            .image(*image)
            .internal_port(*port)
            .volume(format!("{name}_data:{data}")),
        None => base,
    }
}

/// Writes `file` as YAML without a serializer library.
///
/// Keys and values are quoted whenever they are not plain words, so the
/// output stays valid YAML for any service name.
#[must_use]
pub fn write_minimal_yaml(file: &ComposeFile) -> String {
    let mut out = String::from("services:\n");
    for (name, service) in &file.services {
        let _ = writeln!(out, "  {}:", scalar(name));
        if let Some(image) = &service.image {
            let _ = writeln!(out, "    image: {}", scalar(image));
        }
        if let Some(build) = &service.build {
            let _ = writeln!(out, "    build: {}", scalar(build));
        }
        write_list(&mut out, "ports", &service.ports);
        if !service.environment.is_empty() {
            out.push_str("    environment:\n");
            for (key, value) in &service.environment {
                let _ = writeln!(out, "      {}: {}", scalar(key), scalar(value));
            }
        }
        write_list(&mut out, "volumes", &service.volumes);
        write_list(&mut out, "depends_on", &service.depends_on);
    }
    if !file.volumes.is_empty() {
        out.push_str("volumes:\n");
        for name in file.volumes.keys() {
            let _ = writeln!(out, "  {}: {{}}", scalar(name));
        }
    }
    out
}

fn write_list(out: &mut String, key: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "    {key}:");
    for item in items {
        let _ = writeln!(out, "      - {}", scalar(item));
    }
}

fn scalar(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
        && !value.chars().all(|c| c.is_ascii_digit() || c == '.');
    if plain {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Compose YAML through `serde_yaml`.
#[derive(Debug, Clone, Default)]
pub struct ComposeFormatter {
    definitions: Vec<ServiceDefinition>,
}

impl ComposeFormatter {
    /// A formatter using `definitions` for the services they describe.
    #[must_use]
    pub fn new(definitions: Vec<ServiceDefinition>) -> Self {
        Self { definitions }
    }

    /// The document this formatter serializes.
    #[must_use]
    pub fn document(&self, allocations: &BTreeMap<String, AllocatedPort>) -> ComposeFile {
        ComposeFile::build(allocations, &self.definitions)
    }
}

impl OutputFormatter for ComposeFormatter {
    fn format(&self, _project: &str, allocations: &BTreeMap<String, AllocatedPort>) -> Result<String> {
        serde_yaml::to_string(&self.document(allocations)).map_err(|e| {
            Error::ArtifactFormatUnavailable {
                format: "compose".into(),
                reason: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Port;

    fn record(service: &str, port: u16, ty: &str) -> AllocatedPort {
        AllocatedPort::builder("shop", service, Port::try_from(port).unwrap())
            .service_type(ty)
            .build()
            .unwrap()
    }

    fn allocations() -> BTreeMap<String, AllocatedPort> {
        BTreeMap::from([
            ("backend".to_string(), record("backend", 8000, "backend")),
            ("mongodb".to_string(), record("mongodb", 27018, "mongodb")),
        ])
    }

    #[test]
    fn test_stateful_defaults_and_build_context() {
        let file = ComposeFile::build(&allocations(), &[]);
        let mongo = &file.services["mongodb"];
        assert_eq!(mongo.image.as_deref(), Some("mongo:7"));
        assert_eq!(mongo.ports, vec!["27018:27017"]);
        assert_eq!(mongo.volumes, vec!["mongodb_data:/data/db"]);
        assert!(file.volumes.contains_key("mongodb_data"));

        let backend = &file.services["backend"];
        assert_eq!(backend.build.as_deref(), Some("./backend"));
        assert_eq!(backend.ports, vec!["8000:8000"]);
    }

    #[test]
    fn test_definitions_and_missing_dependencies() {
        let defs = vec![ServiceDefinition::new("backend", "backend")
            .image("node:20-alpine")
            .internal_port(4000)
            .env("NODE_ENV", "development")
            .depends_on("mongodb")
            .depends_on("redis")];
        let file = ComposeFile::build(&allocations(), &defs);
        let backend = &file.services["backend"];
        assert_eq!(backend.ports, vec!["8000:4000"]);
        assert_eq!(backend.depends_on, vec!["mongodb"]);
        assert_eq!(backend.environment["NODE_ENV"], "development");
    }

    #[test]
    fn test_serde_output_parses_back() {
        let yaml = ComposeFormatter::default()
            .format("shop", &allocations())
            .unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["services"]["mongodb"]["ports"][0], "27018:27017");
    }

    #[test]
    fn test_minimal_writer_is_valid_yaml() {
        let mut file = ComposeFile::build(&allocations(), &[]);
        if let Some(backend) = file.services.get_mut("backend") {
            backend
                .environment
                .insert("GREETING".into(), "say \"hi\": now".into());
        }
        let yaml = write_minimal_yaml(&file);
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["services"]["backend"]["build"], "./backend");
        assert_eq!(value["services"]["mongodb"]["ports"][0], "27018:27017");
        assert_eq!(
            value["services"]["backend"]["environment"]["GREETING"],
            "say \"hi\": now"
        );
        assert!(value["volumes"]["mongodb_data"].is_mapping());
    }
}
