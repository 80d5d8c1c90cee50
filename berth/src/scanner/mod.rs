//! Port scanning.
//!
//! [`PortScanner`] merges several independent detectors into one cached
//! `port -> PortInfo` map for a configured range. Passes run in a fixed
//! order (process table, `ss`, `netstat`, container runtime, bind probes,
//! reserved table). The first pass to classify a port wins, except that
//! container detections always win. Ports nobody reported are available.
//!
//! A detector that fails is logged and skipped; [`PortScanner::scan`] itself
//! never fails.

pub mod capabilities;
pub mod checker;
pub mod command;
pub mod container;
pub mod listing;
pub mod probe;
pub mod procfs;
pub mod well_known;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

pub use capabilities::{Capabilities, Detector};
pub use checker::{MockChecker, PortChecker};
pub use command::{CommandOutput, CommandRunner, SystemCommandRunner, DEFAULT_COMMAND_TIMEOUT};
pub use probe::{MockProbe, PortProbe, SystemProbe};

use crate::port::{DetectionMethod, PortInfo, PortStatus, Protocol};
use crate::{Error, PortRange, Result};

/// Largest upward offset tried when suggesting an alternative port.
pub const MAX_SUGGESTION_OFFSET: u16 = 100;

/// Scanner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Range the scan map covers.
    pub range: PortRange,
    /// How many evenly spaced ports of the range to bind-probe.
    pub bind_sample: usize,
    /// Per-command timeout for external tools.
    pub timeout: Duration,
    /// Detectors that must not run.
    pub disabled: Vec<Detector>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            range: crate::config::defaults::scan_range(),
            bind_sample: crate::config::defaults::BIND_SAMPLE,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            disabled: Vec::new(),
        }
    }
}

/// Unified, cached view of port occupancy on this host.
///
/// # Examples
///
/// ```
/// use berth::scanner::{Capabilities, Detector, MockProbe, PortScanner, ScannerConfig, SystemCommandRunner};
/// use berth::{PortRange, Protocol};
///
/// let config = ScannerConfig {
///     range: PortRange::from_bounds(5000, 5010).unwrap(),
///     ..ScannerConfig::default()
/// };
/// let mut scanner = PortScanner::with_parts(
///     &config,
///     SystemCommandRunner::default(),
///     MockProbe::occupied([5003]),
///     Capabilities::only(&[Detector::BindTest]),
/// );
///
/// assert!(!scanner.is_available(5003, Protocol::Tcp));
/// assert_eq!(scanner.find_available(2, Some(5002), &Default::default()), vec![5002, 5004]);
/// ```
#[derive(Debug)]
pub struct PortScanner<R = SystemCommandRunner, P = SystemProbe> {
    range: PortRange,
    bind_sample: usize,
    capabilities: Capabilities,
    runner: R,
    probe: P,
    proc_root: PathBuf,
    cache: Option<BTreeMap<u16, PortInfo>>,
    degraded: bool,
}

impl PortScanner {
    /// Creates a scanner for this host, probing capabilities once.
    #[must_use]
    pub fn new(config: &ScannerConfig) -> Self {
        let runner = SystemCommandRunner::new(config.timeout);
        let proc_root = PathBuf::from("/proc");
        let capabilities = Capabilities::detect(&runner, &proc_root, &config.disabled);
        Self::with_parts(config, runner, SystemProbe, capabilities).with_proc_root(proc_root)
    }
}

impl<R: CommandRunner, P: PortProbe> PortScanner<R, P> {
    /// Creates a scanner from explicit parts.
    #[must_use]
    pub fn with_parts(
        config: &ScannerConfig,
        runner: R,
        probe: P,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            range: config.range,
            bind_sample: config.bind_sample,
            capabilities,
            runner,
            probe,
            proc_root: PathBuf::from("/proc"),
            cache: None,
            degraded: false,
        }
    }

    /// Reads socket tables from `root` instead of `/proc`.
    #[must_use]
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// The range this scanner covers.
    #[must_use]
    pub const fn range(&self) -> PortRange {
        self.range
    }

    /// Detectors and serializers found at construction.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Whether the last scan ran without any detector succeeding.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Returns the occupancy map, scanning if there is no cache or
    /// `force_refresh` is set.
    pub fn scan(&mut self, force_refresh: bool) -> &BTreeMap<u16, PortInfo> {
        if force_refresh || self.cache.is_none() {
            let map = self.run_scan();
            self.cache = Some(map);
        }
        self.cache.get_or_insert_with(BTreeMap::new)
    }

    /// Drops the cached map; the next query rescans.
    pub fn refresh(&mut self) {
        self.cache = None;
    }

    fn run_scan(&mut self) -> BTreeMap<u16, PortInfo> {
        let mut map = BTreeMap::new();
        let mut succeeded = 0usize;

        let passes: Vec<Detector> = self
            .capabilities
            .detectors
            .iter()
            .copied()
            .filter(|d| *d != Detector::BindTest)
            .collect();

        for detector in passes {
            match self.run_pass(detector) {
                Ok(infos) => {
                    succeeded += 1;
                    log::debug!("{detector}: {} socket(s)", infos.len());
                    for info in infos {
                        self.merge(&mut map, info);
                    }
                }
                Err(e) => log::debug!("{detector} skipped: {e}"),
            }
        }

        if self.capabilities.has(Detector::BindTest) {
            succeeded += 1;
            self.bind_pass(&mut map);
        }

        for (port, service) in well_known::RESERVED_PORTS {
            if self.range.contains_value(*port) && !map.contains_key(port) {
                map.insert(
                    *port,
                    PortInfo::new(
                        *port,
                        PortStatus::Reserved,
                        Protocol::Tcp,
                        DetectionMethod::WellKnown,
                    )
                    .with_description(format!("reserved for {service}")),
                );
            }
        }

        self.degraded = succeeded == 0;
        if self.degraded {
            log::warn!(
                "no detector could run; port status unknown, allocations rely on live probes"
            );
        } else {
            log::info!("scanned {}: {} port(s) in use", self.range, map.len());
        }
        map
    }

    fn run_pass(&self, detector: Detector) -> Result<Vec<PortInfo>> {
        match detector {
            Detector::ProcessTable => procfs::scan(&self.proc_root),
            Detector::SocketSummary => {
                let out = self.run_tool(detector, "ss", &["-tulnpH"])?;
                Ok(listing::parse_ss(&out))
            }
            Detector::LegacyListing => {
                let args: &[&'static str] = if cfg!(target_os = "linux") {
                    &["-tuln"]
                } else {
                    &["-an"]
                };
                let out = self.run_tool(detector, "netstat", args)?;
                Ok(listing::parse_netstat(&out))
            }
            Detector::ContainerRuntime => {
                let out = self.run_tool(detector, "docker", &container::DOCKER_PS_ARGS)?;
                Ok(container::parse_docker_ps(&out))
            }
            Detector::BindTest => Ok(Vec::new()),
        }
    }

    fn run_tool(
        &self,
        detector: Detector,
        program: &str,
        args: &[&'static str],
    ) -> Result<String> {
        let out = self.runner.run(program, args)?;
        if out.success {
            Ok(out.stdout)
        } else {
            Err(Error::DetectionUnavailable {
                method: detector.to_string(),
                reason: format!("{program} exited with failure: {}", out.stderr.trim()),
            })
        }
    }

    fn merge(&self, map: &mut BTreeMap<u16, PortInfo>, info: PortInfo) {
        if !self.range.contains_value(info.port) {
            return;
        }
        if info.status == PortStatus::OccupiedContainer {
            map.insert(info.port, info);
        } else {
            map.entry(info.port).or_insert(info);
        }
    }

    fn bind_pass(&self, map: &mut BTreeMap<u16, PortInfo>) {
        let candidates: BTreeSet<u16> = well_known::COMMON_DEV_PORTS
            .iter()
            .copied()
            .filter(|p| self.range.contains_value(*p))
            .chain(self.range.sample(self.bind_sample).into_iter().map(u16::from))
            .filter(|p| !map.contains_key(p))
            .collect();

        let mut taken = 0usize;
        for port in candidates {
            if self.probe.is_free(port, Protocol::Tcp) {
                continue;
            }
            taken += 1;
            // A refused bind below 1024 usually means missing privileges.
            let status = if port < 1024 {
                PortStatus::Unknown
            } else {
                PortStatus::OccupiedSystem
            };
            map.insert(
                port,
                PortInfo::new(port, status, Protocol::Tcp, DetectionMethod::BindTest)
                    .with_description("bind failed"),
            );
        }
        log::debug!("bind_test: {taken} port(s) refused");
    }

    /// Whether `port` is free: the cached classification when the map lists
    /// the port, otherwise a live bind probe.
    pub fn is_available(&mut self, port: u16, protocol: Protocol) -> bool {
        if let Some(info) = self.scan(false).get(&port) {
            return info.status.is_available();
        }
        self.probe.is_free(port, protocol)
    }

    /// Finds up to `count` free ports scanning upward from `start` (default
    /// the range minimum), skipping `avoid`.
    pub fn find_available(
        &mut self,
        count: usize,
        start: Option<u16>,
        avoid: &BTreeSet<u16>,
    ) -> Vec<u16> {
        let first = start.unwrap_or(self.range.min().value());
        let mut found = Vec::with_capacity(count);
        if count == 0 {
            return found;
        }

        let candidates: Vec<u16> = self
            .range
            .iter()
            .map(u16::from)
            .filter(|p| *p >= first && !avoid.contains(p))
            .collect();
        for port in candidates {
            if self.is_available(port, Protocol::Tcp) {
                found.push(port);
                if found.len() == count {
                    return found;
                }
            }
        }

        log::warn!(
            "found only {} of {count} free port(s) in {} from {first}",
            found.len(),
            self.range
        );
        found
    }

    /// Returns details for every port in `desired` that is taken.
    pub fn get_conflicts(&mut self, desired: &[u16]) -> Vec<PortInfo> {
        let mut conflicts = Vec::new();
        for &port in desired {
            if let Some(info) = self.scan(false).get(&port) {
                if !info.status.is_available() {
                    conflicts.push(info.clone());
                }
                continue;
            }
            if !self.probe.is_free(port, Protocol::Tcp) {
                conflicts.push(
                    PortInfo::new(
                        port,
                        PortStatus::OccupiedSystem,
                        Protocol::Tcp,
                        DetectionMethod::BindTest,
                    )
                    .with_description("bind failed"),
                );
            }
        }
        conflicts
    }

    /// Suggests a replacement for each conflicting port.
    ///
    /// The nearest free port above the conflict (up to
    /// [`MAX_SUGGESTION_OFFSET`]) is preferred; otherwise a fresh range
    /// search. No suggestion is handed out twice.
    pub fn suggest_alternatives(&mut self, conflicts: &[PortInfo]) -> BTreeMap<u16, u16> {
        let conflicting: BTreeSet<u16> = conflicts.iter().map(|c| c.port).collect();
        let mut used: BTreeSet<u16> = BTreeSet::new();
        let mut suggestions = BTreeMap::new();

        for conflict in conflicts {
            let nearby = (1..=MAX_SUGGESTION_OFFSET)
                .filter_map(|offset| conflict.port.checked_add(offset))
                .find(|candidate| {
                    !used.contains(candidate)
                        && !conflicting.contains(candidate)
                        && self.is_available(*candidate, conflict.protocol)
                });

            let suggestion = nearby.or_else(|| {
                let avoid: BTreeSet<u16> = used.union(&conflicting).copied().collect();
                self.find_available(1, None, &avoid).first().copied()
            });

            match suggestion {
                Some(port) => {
                    used.insert(port);
                    suggestions.insert(conflict.port, port);
                }
                None => log::warn!("no alternative found for port {}", conflict.port),
            }
        }
        suggestions
    }
}

impl<R: CommandRunner, P: PortProbe> PortChecker for PortScanner<R, P> {
    fn is_available(&mut self, port: u16) -> bool {
        PortScanner::is_available(self, port, Protocol::Tcp)
    }

    fn verify(&mut self, port: u16) -> bool {
        self.probe.is_free(port, Protocol::Tcp)
    }

    fn refresh(&mut self) {
        PortScanner::refresh(self);
    }

    fn conflicts(&mut self, ports: &[u16]) -> Vec<PortInfo> {
        self.get_conflicts(ports)
    }
}
