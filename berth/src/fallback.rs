//! Reduced-capability scan and allocation.
//!
//! [`FallbackAllocator`] needs nothing but socket binds. It serves when the
//! primary engine cannot be built (for example the store is unreadable) or
//! when fallback is forced by configuration.
//!
//! Limitations: picks live only in memory and a batch is a single pass.
//! Ports the caller already holds are passed in through
//! [`FallbackAllocator::allocate_excluding`]; nothing stops two separate
//! fallback runs (or a fallback run and the primary engine) from handing
//! out the same port.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::allocation::{AllocatedPort, ConflictResolution};
use crate::allocator::{AllocationFailure, BatchAllocation, ServiceRequest};
use crate::port::{DetectionMethod, PortInfo, PortStatus, Protocol};
use crate::scanner::well_known::COMMON_DEV_PORTS;
use crate::scanner::{PortProbe, SystemProbe};
use crate::{Error, Port, PortRange, Result};

/// Upper bound on bind probes per [`FallbackAllocator::scan`].
pub const MAX_PROBES: usize = 50;

/// A minimal service type known to the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackType {
    /// Type name, recorded on allocations.
    pub name: &'static str,
    /// Name fragments selecting this type.
    pub keywords: &'static [&'static str],
    /// Inclusive range.
    pub range: (u16, u16),
    /// First choice.
    pub default_port: Option<u16>,
}

/// Fallback catalog. The last entry is the catch-all.
pub const FALLBACK_TYPES: &[FallbackType] = &[
    FallbackType {
        name: "frontend",
        keywords: &["frontend", "web", "client", "ui", "react", "vue"],
        range: (3000, 3099),
        default_port: Some(3000),
    },
    FallbackType {
        name: "backend",
        keywords: &["backend", "api", "server"],
        range: (8000, 8099),
        default_port: Some(8000),
    },
    FallbackType {
        name: "postgres",
        keywords: &["postgres", "database", "db"],
        range: (5433, 5499),
        default_port: Some(5433),
    },
    FallbackType {
        name: "mongodb",
        keywords: &["mongo"],
        range: (27018, 27099),
        default_port: Some(27018),
    },
    FallbackType {
        name: "redis",
        keywords: &["redis", "cache"],
        range: (6380, 6399),
        default_port: Some(6380),
    },
    FallbackType {
        name: crate::registry::GENERIC_TYPE,
        keywords: &[],
        range: (9000, 9099),
        default_port: None,
    },
];

/// The fallback type for a service name: first keyword hit, else the
/// catch-all.
///
/// ```
/// use berth::fallback::fallback_type;
///
/// assert_eq!(fallback_type("user-api").name, "backend");
/// assert_eq!(fallback_type("mongo").name, "mongodb");
/// assert_eq!(fallback_type("thing").name, "service");
/// ```
#[must_use]
pub fn fallback_type(service: &str) -> &'static FallbackType {
    let lowered = service.to_ascii_lowercase();
    let generic = &FALLBACK_TYPES[FALLBACK_TYPES.len() - 1];
    FALLBACK_TYPES
        .iter()
        .find(|t| t.keywords.iter().any(|k| lowered.contains(k)))
        .unwrap_or(generic)
}

/// Bind-probe-only scanner and allocator.
///
/// # Examples
///
/// ```
/// use berth::fallback::FallbackAllocator;
/// use berth::scanner::MockProbe;
/// use berth::{PortRange, ServiceRequest};
///
/// let mut fallback = FallbackAllocator::with_probe(
///     PortRange::from_bounds(3000, 3999).unwrap(),
///     MockProbe::occupied([3000]),
/// );
/// let batch = fallback
///     .allocate("demo", &[ServiceRequest::from("web"), ServiceRequest::from("api")])
///     .unwrap();
/// assert_eq!(batch.port_of("web"), Some(3001));
/// assert_eq!(batch.port_of("api"), Some(8000));
/// ```
#[derive(Debug, Clone)]
pub struct FallbackAllocator<P = SystemProbe> {
    probe: P,
    range: PortRange,
    scanned: BTreeMap<u16, PortInfo>,
}

impl FallbackAllocator {
    /// A fallback over real sockets whose scan samples `range`.
    #[must_use]
    pub fn new(range: PortRange) -> Self {
        Self::with_probe(range, SystemProbe)
    }
}

impl<P: PortProbe> FallbackAllocator<P> {
    /// A fallback with a custom probe.
    #[must_use]
    pub fn with_probe(range: PortRange, probe: P) -> Self {
        Self {
            probe,
            range,
            scanned: BTreeMap::new(),
        }
    }

    /// The range [`Self::scan`] samples.
    #[must_use]
    pub const fn range(&self) -> PortRange {
        self.range
    }

    /// Probes the common development ports plus a sample of the range, at
    /// most [`MAX_PROBES`] binds in total. Returns the occupied ports found.
    pub fn scan(&mut self) -> &BTreeMap<u16, PortInfo> {
        let mut targets: BTreeSet<u16> = COMMON_DEV_PORTS.iter().copied().collect();
        let room = MAX_PROBES.saturating_sub(targets.len());
        targets.extend(self.range.sample(room).into_iter().map(Port::value));

        self.scanned = targets
            .into_iter()
            .take(MAX_PROBES)
            .filter(|port| !self.probe.is_free(*port, Protocol::Tcp))
            .map(|port| {
                let info = PortInfo::new(
                    port,
                    PortStatus::OccupiedSystem,
                    Protocol::Tcp,
                    DetectionMethod::BindTest,
                )
                .with_description("bind failed");
                (port, info)
            })
            .collect();
        log::debug!("fallback scan found {} occupied port(s)", self.scanned.len());
        &self.scanned
    }

    /// Occupied ports from the last [`Self::scan`].
    #[must_use]
    pub const fn scanned(&self) -> &BTreeMap<u16, PortInfo> {
        &self.scanned
    }

    /// Whether `port` binds right now.
    #[must_use]
    pub fn is_free(&self, port: u16) -> bool {
        self.probe.is_free(port, Protocol::Tcp)
    }

    /// Assigns ports to `services` in one pass.
    ///
    /// Each service walks preferred, default, its type range, then the
    /// generic range. Picks are distinct within the call and each is
    /// bind-checked at the moment it is chosen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty project or service name.
    pub fn allocate(
        &mut self,
        project: &str,
        services: &[ServiceRequest],
    ) -> Result<BatchAllocation> {
        self.allocate_excluding(project, services, &BTreeSet::new())
    }

    /// Like [`Self::allocate`], but never picks a port in `exclude`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty project or service name.
    pub fn allocate_excluding(
        &mut self,
        project: &str,
        services: &[ServiceRequest],
        exclude: &BTreeSet<u16>,
    ) -> Result<BatchAllocation> {
        let generic = &FALLBACK_TYPES[FALLBACK_TYPES.len() - 1];
        let mut taken = exclude.clone();
        let mut batch = BatchAllocation::default();
        let now = Utc::now();

        for request in services {
            let ty = match request.service_type.as_deref() {
                Some(name) => FALLBACK_TYPES
                    .iter()
                    .find(|t| t.name == name)
                    .unwrap_or_else(|| fallback_type(&request.name)),
                None => fallback_type(&request.name),
            };

            let mut candidates: Vec<(u16, ConflictResolution)> = Vec::new();
            if let Some(port) = request.preferred.filter(|p| *p != 0) {
                candidates.push((port, ConflictResolution::Preferred));
            }
            if let Some(port) = ty.default_port {
                candidates.push((port, ConflictResolution::DefaultPort));
            }
            let ranges = [ty.range, generic.range];
            let searched = ranges
                .iter()
                .flat_map(|(min, max)| *min..=*max)
                .map(|port| (port, ConflictResolution::Fallback));

            let pick = candidates
                .into_iter()
                .chain(searched)
                .find(|(port, _)| {
                    !taken.contains(port)
                        && !self.scanned.contains_key(port)
                        && self.probe.is_free(*port, Protocol::Tcp)
                });

            match pick {
                Some((port, resolution)) => {
                    taken.insert(port);
                    let record = AllocatedPort::builder(project, &request.name, Port::try_from(port)?)
                        .service_type(ty.name)
                        .resolution(resolution)
                        .allocated_at(now)
                        .build()?;
                    log::info!("fallback: {project}/{} -> {port}", request.name);
                    batch.allocated.push(record);
                }
                None => {
                    let reason = Error::AllocationExhausted {
                        service: request.name.clone(),
                        reason: format!(
                            "no bindable port in {}-{} or {}-{}",
                            ty.range.0, ty.range.1, generic.range.0, generic.range.1
                        ),
                    };
                    log::error!("{reason}");
                    batch.failed.push(AllocationFailure {
                        service: request.name.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::MockProbe;

    fn fallback(occupied: &[u16]) -> FallbackAllocator<MockProbe> {
        FallbackAllocator::with_probe(
            PortRange::from_bounds(3000, 30000).unwrap(),
            MockProbe::occupied(occupied.iter().copied()),
        )
    }

    #[test]
    fn test_scan_is_bounded() {
        let mut fb = fallback(&[3000, 8080, 29999]);
        let found = fb.scan().clone();
        assert!(found.contains_key(&3000));
        assert!(found.contains_key(&8080));
        assert!(found.values().all(|i| i.detection_method == DetectionMethod::BindTest));
        // 29999 is not among the probed targets
        assert!(!found.contains_key(&29999));
    }

    #[test]
    fn test_waterfall_tags() {
        let mut fb = fallback(&[3000]);
        let batch = fb
            .allocate(
                "demo",
                &[
                    ServiceRequest::from("frontend"),
                    ServiceRequest::from("api"),
                    ServiceRequest::from("thing").prefer(4321),
                    ServiceRequest::from("other"),
                ],
            )
            .unwrap();
        let tags: Vec<(u16, ConflictResolution)> = batch
            .allocated
            .iter()
            .map(|r| (r.port().value(), r.conflict_resolution()))
            .collect();
        assert_eq!(
            tags,
            vec![
                (3001, ConflictResolution::Fallback),
                (8000, ConflictResolution::DefaultPort),
                (4321, ConflictResolution::Preferred),
                (9000, ConflictResolution::Fallback),
            ]
        );
    }

    #[test]
    fn test_distinct_within_pass() {
        let mut fb = fallback(&[]);
        let requests: Vec<ServiceRequest> =
            ["web", "ui", "client"].map(ServiceRequest::from).to_vec();
        let batch = fb.allocate("demo", &requests).unwrap();
        let ports: BTreeSet<u16> = batch.allocated.iter().map(|r| r.port().value()).collect();
        assert_eq!(ports.len(), 3);
    }

    #[test]
    fn test_scanned_ports_avoided() {
        let mut fb = fallback(&[8000]);
        fb.scan();
        let batch = fb.allocate("demo", &["api".into()]).unwrap();
        assert_eq!(batch.port_of("api"), Some(8001));
    }

    #[test]
    fn test_excluded_ports_avoided() {
        let mut fb = fallback(&[]);
        let held = BTreeSet::from([3000, 3001, 8000]);
        let batch = fb
            .allocate_excluding("demo", &["web".into(), "api".into()], &held)
            .unwrap();
        assert_eq!(batch.port_of("web"), Some(3002));
        assert_eq!(batch.port_of("api"), Some(8001));
    }

    #[test]
    fn test_is_free_reflects_binds() {
        let fb = fallback(&[5432]);
        assert!(!fb.is_free(5432));
        assert!(fb.is_free(5433));
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let occupied: Vec<u16> = (6380..=6399).chain(9000..=9099).collect();
        let mut fb = fallback(&occupied);
        let batch = fb.allocate("demo", &["redis".into()]).unwrap();
        assert!(batch.allocated.is_empty());
        assert_eq!(batch.failed[0].service, "redis");
    }

    #[test]
    fn test_empty_project_rejected() {
        let mut fb = fallback(&[]);
        assert!(fb.allocate("", &["web".into()]).is_err());
    }
}
