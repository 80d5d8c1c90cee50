//! Static checks over a set of service definitions.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::templates::ServiceDefinition;

/// Two or more definitions asking for the same fixed host port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixedPortConflict {
    /// The contested port.
    pub port: u16,
    /// Services asking for it, in declaration order.
    pub services: Vec<String>,
}

/// A fixed port moved to one of the service's alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortReassignment {
    /// The service that moved.
    pub service: String,
    /// The port it asked for.
    pub from: u16,
    /// The alternative it got.
    pub to: u16,
}

/// Outcome of [`resolve_fixed_port_conflicts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictResolutionReport {
    /// Definitions with conflicts rewritten.
    pub definitions: Vec<ServiceDefinition>,
    /// Services moved to an alternative.
    pub reassigned: Vec<PortReassignment>,
    /// Services whose alternatives were all taken; their fixed port is
    /// cleared so the allocator picks one.
    pub unresolved: Vec<String>,
}

/// A dependency naming a service that is not in the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    /// The dependent service.
    pub service: String,
    /// The absent dependency.
    pub missing: String,
}

/// Finds fixed ports requested by more than one definition.
#[must_use]
pub fn detect_fixed_port_conflicts(definitions: &[ServiceDefinition]) -> Vec<FixedPortConflict> {
    let mut by_port: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for def in definitions {
        if let Some(port) = def.fixed_port {
            by_port.entry(port).or_default().push(def.name.clone());
        }
    }
    by_port
        .into_iter()
        .filter(|(_, services)| services.len() > 1)
        .map(|(port, services)| FixedPortConflict { port, services })
        .collect()
}

/// Rewrites colliding fixed ports.
///
/// The first definition to claim a port keeps it. Each later collider moves
/// to its first declared alternative that no other definition requests and
/// nobody has taken yet.
#[must_use]
pub fn resolve_fixed_port_conflicts(definitions: &[ServiceDefinition]) -> ConflictResolutionReport {
    let requested: BTreeSet<u16> = definitions.iter().filter_map(|d| d.fixed_port).collect();
    let mut taken = BTreeSet::new();
    let mut report = ConflictResolutionReport::default();

    for def in definitions {
        let mut def = def.clone();
        if let Some(port) = def.fixed_port {
            if taken.insert(port) {
                report.definitions.push(def);
                continue;
            }
            let alternative = def
                .alternatives
                .iter()
                .copied()
                .find(|alt| !taken.contains(alt) && !requested.contains(alt));
            match alternative {
                Some(alt) => {
                    taken.insert(alt);
                    def.fixed_port = Some(alt);
                    report.reassigned.push(PortReassignment {
                        service: def.name.clone(),
                        from: port,
                        to: alt,
                    });
                }
                None => {
                    log::warn!(
                        "{}: fixed port {port} is taken and no alternative is free",
                        def.name
                    );
                    def.fixed_port = None;
                    report.unresolved.push(def.name.clone());
                }
            }
        }
        report.definitions.push(def);
    }
    report
}

/// Lists `depends_on` entries naming services absent from the set.
#[must_use]
pub fn validate_dependencies(definitions: &[ServiceDefinition]) -> Vec<MissingDependency> {
    let names: BTreeSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
    definitions
        .iter()
        .flat_map(|def| {
            def.depends_on
                .iter()
                .filter(|dep| !names.contains(dep.as_str()))
                .map(|dep| MissingDependency {
                    service: def.name.clone(),
                    missing: dep.clone(),
                })
        })
        .collect()
}
