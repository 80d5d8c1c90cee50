//! Service type catalog and project templates.
//!
//! The registry is pure data: it knows which port range each kind of
//! service draws from and how urgent it is, but it never looks at the OS
//! and never allocates. Users may override or extend the catalog through a
//! JSON service-types file.

pub mod catalog;
pub mod classify;
pub mod conflicts;
pub mod templates;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use catalog::GENERIC_TYPE;
pub use conflicts::{
    ConflictResolutionReport, FixedPortConflict, MissingDependency, PortReassignment,
};
pub use templates::{ProjectTemplate, ServiceDefinition};

use crate::{Error, PortRange, Result};

/// File name of the service-types override record.
pub const OVERRIDES_FILE: &str = "service_types.json";

const OVERRIDES_VERSION: u32 = 1;

/// A kind of service and the ports it may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceType {
    /// Type name.
    pub name: String,
    /// Inclusive range ports are drawn from.
    pub port_range: PortRange,
    /// First choice inside the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_port: Option<u16>,
    /// Allocation order within a batch; lower goes first.
    pub priority: u32,
    /// Suggested alternatives to the default.
    #[serde(default)]
    pub port_alternatives: Vec<u16>,
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
}

impl ServiceType {
    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty name or a default port
    /// outside the range.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation {
                field: "service_type.name".into(),
                message: "must not be empty".into(),
            });
        }
        if let Some(default) = self.default_port {
            if !self.port_range.contains_value(default) {
                return Err(Error::Validation {
                    field: format!("service_type.{}.default_port", self.name),
                    message: format!("{default} is outside {}", self.port_range),
                });
            }
        }
        if self.port_alternatives.contains(&0) {
            return Err(Error::Validation {
                field: format!("service_type.{}.port_alternatives", self.name),
                message: "port 0 is invalid".into(),
            });
        }
        Ok(())
    }

    /// Whether clients reach this service over plain HTTP.
    #[must_use]
    pub fn is_http(&self) -> bool {
        matches!(
            self.name.as_str(),
            "frontend"
                | "backend"
                | "gateway"
                | "proxy"
                | "grafana"
                | "prometheus"
                | "mailhog"
                | "devtools"
                | "elasticsearch"
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OverridesFile {
    version: u32,
    service_types: Vec<ServiceType>,
}

/// Catalog of service types and templates.
///
/// # Examples
///
/// ```
/// use berth::ServiceRegistry;
///
/// let registry = ServiceRegistry::builtin();
/// assert_eq!(registry.classify("mongo").name, "mongodb");
/// assert_eq!(registry.classify("whatever").name, "service");
/// assert!(registry.template("mern").is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    types: BTreeMap<String, ServiceType>,
    templates: BTreeMap<String, ProjectTemplate>,
    generic: ServiceType,
}

impl ServiceRegistry {
    /// The built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let types: BTreeMap<String, ServiceType> = catalog::builtin_types()
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        let generic = types
            .get(GENERIC_TYPE)
            .cloned()
            .unwrap_or_else(fallback_generic);
        Self {
            types,
            templates: templates::builtin_templates()
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
            generic,
        }
    }

    /// The built-in catalog with overrides from `path` applied, if the file
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// holds an invalid type.
    pub fn load(path: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        if path.exists() {
            let applied = registry.load_overrides(path)?;
            log::debug!("applied {applied} service type override(s) from {}", path.display());
        }
        Ok(registry)
    }

    /// Looks up a type by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceType> {
        self.types.get(name)
    }

    /// All types, by name.
    pub fn types(&self) -> impl Iterator<Item = &ServiceType> {
        self.types.values()
    }

    /// All types, ordered by priority then name.
    #[must_use]
    pub fn by_priority(&self) -> Vec<&ServiceType> {
        let mut types: Vec<&ServiceType> = self.types.values().collect();
        types.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        types
    }

    /// The catch-all type.
    #[must_use]
    pub const fn generic(&self) -> &ServiceType {
        &self.generic
    }

    /// Maps a free-form service name to a type.
    ///
    /// Exact type names win, then the first matching keyword in
    /// [`classify::keyword_type`]'s table, then the generic type.
    #[must_use]
    pub fn classify(&self, service_name: &str) -> &ServiceType {
        let lowered = service_name.to_ascii_lowercase();
        if let Some(exact) = self.types.get(&lowered) {
            return exact;
        }
        classify::keyword_type(&lowered)
            .and_then(|name| self.types.get(name))
            .unwrap_or(&self.generic)
    }

    /// Resolves an explicit type name, falling back to classification of
    /// the service name when the type is unknown.
    #[must_use]
    pub fn resolve(&self, service_name: &str, service_type: Option<&str>) -> &ServiceType {
        match service_type {
            Some(name) => self.get(name).unwrap_or_else(|| {
                log::warn!("unknown service type '{name}' for {service_name}; classifying by name");
                self.classify(service_name)
            }),
            None => self.classify(service_name),
        }
    }

    /// Adds or replaces a type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the type is inconsistent.
    pub fn insert(&mut self, service_type: ServiceType) -> Result<()> {
        service_type.validate()?;
        if service_type.name == GENERIC_TYPE {
            self.generic = service_type.clone();
        }
        self.types.insert(service_type.name.clone(), service_type);
        Ok(())
    }

    /// Looks up a template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTemplate`] if no template has that name.
    pub fn template(&self, name: &str) -> Result<&ProjectTemplate> {
        self.templates.get(name).ok_or_else(|| Error::UnknownTemplate {
            name: name.to_string(),
        })
    }

    /// All templates, by name.
    pub fn templates(&self) -> impl Iterator<Item = &ProjectTemplate> {
        self.templates.values()
    }

    /// See [`conflicts::detect_fixed_port_conflicts`].
    #[must_use]
    pub fn detect_fixed_port_conflicts(
        &self,
        definitions: &[ServiceDefinition],
    ) -> Vec<FixedPortConflict> {
        conflicts::detect_fixed_port_conflicts(definitions)
    }

    /// See [`conflicts::resolve_fixed_port_conflicts`].
    #[must_use]
    pub fn resolve_fixed_port_conflicts(
        &self,
        definitions: &[ServiceDefinition],
    ) -> ConflictResolutionReport {
        conflicts::resolve_fixed_port_conflicts(definitions)
    }

    /// See [`conflicts::validate_dependencies`].
    #[must_use]
    pub fn validate_dependencies(&self, definitions: &[ServiceDefinition]) -> Vec<MissingDependency> {
        conflicts::validate_dependencies(definitions)
    }

    /// Merges types from an override file into the catalog.
    ///
    /// Returns how many types were applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, has an
    /// unsupported version, or contains an invalid type.
    pub fn load_overrides(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)?;
        let file: OverridesFile = serde_json::from_str(&content)?;
        if file.version != OVERRIDES_VERSION {
            return Err(Error::UnsupportedSchemaVersion {
                expected: OVERRIDES_VERSION,
                found: file.version,
            });
        }
        let count = file.service_types.len();
        for service_type in file.service_types {
            self.insert(service_type)?;
        }
        Ok(count)
    }

    /// Writes the full catalog as an override file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the file cannot be written.
    pub fn save_overrides(&self, path: &Path) -> Result<()> {
        let file = OverridesFile {
            version: OVERRIDES_VERSION,
            service_types: self.types.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        crate::store::write_atomic(path, json.as_bytes())
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn fallback_generic() -> ServiceType {
    ServiceType {
        name: GENERIC_TYPE.to_string(),
        port_range: crate::config::defaults::generic_range(),
        default_port: None,
        priority: 10,
        port_alternatives: Vec::new(),
        description: "Unclassified service".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_name_beats_keywords() {
        let registry = ServiceRegistry::builtin();
        assert_eq!(registry.classify("redis").name, "redis");
        assert_eq!(registry.classify("Frontend").name, "frontend");
        assert_eq!(registry.classify("mongo").name, "mongodb");
        assert_eq!(registry.classify("zzz").name, GENERIC_TYPE);
    }

    #[test]
    fn test_resolve_unknown_type_classifies_name() {
        let registry = ServiceRegistry::builtin();
        assert_eq!(registry.resolve("api", Some("nope")).name, "backend");
        assert_eq!(registry.resolve("api", Some("redis")).name, "redis");
    }

    #[test]
    fn test_by_priority_is_sorted() {
        let registry = ServiceRegistry::builtin();
        let ordered = registry.by_priority();
        assert_eq!(ordered[0].name, "backend");
        assert_eq!(ordered[1].name, "frontend");
        assert!(ordered.windows(2).all(|w| w[0].priority <= w[1].priority));
        assert_eq!(ordered.last().unwrap().name, GENERIC_TYPE);
    }

    #[test]
    fn test_unknown_template() {
        let registry = ServiceRegistry::builtin();
        assert!(matches!(
            registry.template("lamp"),
            Err(Error::UnknownTemplate { .. })
        ));
        assert_eq!(registry.templates().count(), 5);
    }

    #[test]
    fn test_insert_rejects_default_outside_range() {
        let mut registry = ServiceRegistry::builtin();
        let err = registry
            .insert(ServiceType {
                name: "odd".into(),
                port_range: PortRange::from_bounds(7000, 7010).unwrap(),
                default_port: Some(8000),
                priority: 3,
                port_alternatives: vec![],
                description: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_overrides_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OVERRIDES_FILE);

        let mut registry = ServiceRegistry::builtin();
        registry
            .insert(ServiceType {
                name: "redis".into(),
                port_range: PortRange::from_bounds(16380, 16399).unwrap(),
                default_port: Some(16380),
                priority: 3,
                port_alternatives: vec![],
                description: "moved".into(),
            })
            .unwrap();
        registry.save_overrides(&path).unwrap();

        let loaded = ServiceRegistry::load(&path).unwrap();
        assert_eq!(loaded.get("redis").unwrap().default_port, Some(16380));
        assert_eq!(loaded.classify("session-cache").port_range.min().value(), 16380);
    }

    #[test]
    fn test_load_rejects_corrupt_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OVERRIDES_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(ServiceRegistry::load(&path).is_err());

        fs::write(&path, r#"{"version": 9, "service_types": []}"#).unwrap();
        assert!(matches!(
            ServiceRegistry::load(&path),
            Err(Error::UnsupportedSchemaVersion { found: 9, .. })
        ));
    }

    #[test]
    fn test_missing_overrides_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ServiceRegistry::load(&dir.path().join("absent.json")).unwrap();
        assert!(registry.get("frontend").is_some());
    }
}
