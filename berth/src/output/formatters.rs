//! Text formatters for allocation sets.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::allocation::{AllocatedPort, ConflictResolution};
use crate::{Error, Result};

use super::{OutputFormatter, ShellType};

/// Name of the variable carrying the compose project name.
pub const COMPOSE_PROJECT_VAR: &str = "COMPOSE_PROJECT_NAME";

fn is_valid_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The variable holding a service's port: `user-api` becomes
/// `USER_API_PORT`.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the result is not a valid variable name.
///
/// ```
/// use berth::output::port_var_name;
///
/// assert_eq!(port_var_name("user-api").unwrap(), "USER_API_PORT");
/// assert!(port_var_name("9lives").is_err());
/// ```
pub fn port_var_name(service: &str) -> Result<String> {
    let var = format!(
        "{}_PORT",
        service.to_ascii_uppercase().replace(['-', '.', ' '], "_")
    );
    if is_valid_env_var_name(&var) {
        Ok(var)
    } else {
        Err(Error::Validation {
            field: "environment_variable".into(),
            message: format!(
                "'{var}' is not a valid variable name; it must start with a letter or \
                 underscore and contain only letters, digits and underscores"
            ),
        })
    }
}

/// Lower-case letters, digits, `-` and `_`, as compose requires.
///
/// ```
/// use berth::output::compose_project_name;
///
/// assert_eq!(compose_project_name("My Shop"), "my_shop");
/// ```
#[must_use]
pub fn compose_project_name(project: &str) -> String {
    project
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-' | '_') => c,
            _ => '_',
        })
        .collect()
}

fn variables(
    project: &str,
    allocations: &BTreeMap<String, AllocatedPort>,
) -> Result<Vec<(String, String)>> {
    let mut vars = vec![(COMPOSE_PROJECT_VAR.to_string(), compose_project_name(project))];
    for (service, record) in allocations {
        vars.push((port_var_name(service)?, record.port().to_string()));
    }
    Ok(vars)
}

/// `.env` lines: `COMPOSE_PROJECT_NAME` then one `<SERVICE>_PORT` per
/// service.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvFormatter;

impl OutputFormatter for EnvFormatter {
    fn format(&self, project: &str, allocations: &BTreeMap<String, AllocatedPort>) -> Result<String> {
        let mut out = String::new();
        for (var, value) in variables(project, allocations)? {
            out.push_str(&format!("{var}={value}\n"));
        }
        Ok(out)
    }
}

/// Shell script exporting the same variables as [`EnvFormatter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportFormatter {
    shell: ShellType,
}

impl ExportFormatter {
    /// A formatter for `shell`.
    #[must_use]
    pub const fn new(shell: ShellType) -> Self {
        Self { shell }
    }
}

impl OutputFormatter for ExportFormatter {
    fn format(&self, project: &str, allocations: &BTreeMap<String, AllocatedPort>) -> Result<String> {
        let mut out = format!("{}\n# ports for {project}\n", self.shell.header());
        for (var, value) in variables(project, allocations)? {
            out.push_str(&self.shell.format_export(&var, &value));
            out.push('\n');
        }
        Ok(out)
    }
}

#[derive(Serialize)]
struct JsonService<'a> {
    port: u16,
    service_type: &'a str,
    conflict_resolution: ConflictResolution,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    project: &'a str,
    services: BTreeMap<&'a str, JsonService<'a>>,
}

/// Pretty JSON: `{"project": ..., "services": {name: {port, ...}}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format(&self, project: &str, allocations: &BTreeMap<String, AllocatedPort>) -> Result<String> {
        let document = JsonDocument {
            project,
            services: allocations
                .iter()
                .map(|(name, record)| {
                    (
                        name.as_str(),
                        JsonService {
                            port: record.port().value(),
                            service_type: record.service_type(),
                            conflict_resolution: record.conflict_resolution(),
                        },
                    )
                })
                .collect(),
        };
        let mut json = serde_json::to_string_pretty(&document)?;
        json.push('\n');
        Ok(json)
    }
}

/// Aligned listing for terminals.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format(&self, project: &str, allocations: &BTreeMap<String, AllocatedPort>) -> Result<String> {
        if allocations.is_empty() {
            return Ok(format!("No ports allocated for {project}.\n"));
        }
        let width = allocations.keys().map(String::len).max().unwrap_or(0);
        let mut out = format!("Ports for {project}:\n");
        for (service, record) in allocations {
            out.push_str(&format!(
                "  {service:<width$}  {:>5}  {} ({})\n",
                record.port().value(),
                record.service_type(),
                record.conflict_resolution()
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Port;

    fn allocations() -> BTreeMap<String, AllocatedPort> {
        [("frontend", 3000, "frontend"), ("user-api", 8001, "backend")]
            .into_iter()
            .map(|(service, port, ty)| {
                let record = AllocatedPort::builder("shop", service, Port::try_from(port).unwrap())
                    .service_type(ty)
                    .build()
                    .unwrap();
                (service.to_string(), record)
            })
            .collect()
    }

    #[test]
    fn test_env() {
        let out = EnvFormatter.format("Shop", &allocations()).unwrap();
        assert_eq!(
            out,
            "COMPOSE_PROJECT_NAME=shop\nFRONTEND_PORT=3000\nUSER_API_PORT=8001\n"
        );
    }

    #[test]
    fn test_export_per_shell() {
        let bash = ExportFormatter::new(ShellType::Bash)
            .format("shop", &allocations())
            .unwrap();
        assert!(bash.starts_with("#!/usr/bin/env bash\n"));
        assert!(bash.contains("export USER_API_PORT=8001\n"));

        let fish = ExportFormatter::new(ShellType::Fish)
            .format("shop", &allocations())
            .unwrap();
        assert!(fish.contains("set -gx FRONTEND_PORT 3000\n"));
    }

    #[test]
    fn test_json_shape() {
        let out = JsonFormatter.format("shop", &allocations()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["project"], "shop");
        assert_eq!(value["services"]["user-api"]["port"], 8001);
        assert_eq!(value["services"]["frontend"]["service_type"], "frontend");
        assert_eq!(
            value["services"]["frontend"]["conflict_resolution"],
            "range_search"
        );
    }

    #[test]
    fn test_invalid_service_name_rejected() {
        let mut set = allocations();
        let record = AllocatedPort::builder("shop", "1st", Port::try_from(9000).unwrap())
            .build()
            .unwrap();
        set.insert("1st".into(), record);
        assert!(EnvFormatter.format("shop", &set).is_err());
    }

    #[test]
    fn test_human_empty_and_filled() {
        assert_eq!(
            HumanFormatter.format("shop", &BTreeMap::new()).unwrap(),
            "No ports allocated for shop.\n"
        );
        let out = HumanFormatter.format("shop", &allocations()).unwrap();
        assert!(out.contains("user-api   8001  backend (range_search)"));
    }
}
