//! The [`Berth`] facade.
//!
//! `Berth` decides once, at construction, which engine serves calls. The
//! primary engine is a [`PortAllocator`] over the configured store and a
//! [`PortScanner`]. When that cannot be built (unusable data directory,
//! unreadable store, invalid configured ranges) or fallback is forced, a
//! [`FallbackAllocator`] takes over and the reason is kept for
//! [`Berth::diagnostics`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Serialize;

use crate::allocation::AllocatedPort;
use crate::allocator::{
    AllocationReport, BatchAllocation, CleanupReport, PortAllocator, PortOwner, ServiceRequest,
};
use crate::config::Config;
use crate::fallback::FallbackAllocator;
use crate::output::{ArtifactFormat, ArtifactGenerator, GeneratedArtifacts};
use crate::port::{DetectionMethod, PortInfo, PortStatus, Protocol};
use crate::registry::{
    ConflictResolutionReport, MissingDependency, ServiceDefinition, ServiceRegistry,
    OVERRIDES_FILE,
};
use crate::scanner::{
    Capabilities, Detector, PortChecker, PortProbe, PortScanner, ScannerConfig, SystemProbe,
};
use crate::store::AllocationStore;
use crate::{Error, PortRange, Result};

/// The primary allocator with its store and checker type-erased.
pub type PrimaryAllocator = PortAllocator<Box<dyn AllocationStore>, Box<dyn PortChecker>>;

/// The engine serving a [`Berth`].
pub enum Engine {
    /// Persistent allocation with full scanning.
    Primary(PrimaryAllocator),
    /// Bind-probe-only allocation kept in memory.
    Fallback {
        /// The fallback allocator.
        allocator: FallbackAllocator<Box<dyn PortProbe>>,
        /// Why the primary engine is not in use.
        reason: String,
        /// Allocations made in this session, by project then service.
        session: BTreeMap<String, BTreeMap<String, AllocatedPort>>,
    },
}

impl Engine {
    /// `"primary"` or `"fallback"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Primary(_) => "primary",
            Self::Fallback { .. } => "fallback",
        }
    }

    /// A fallback engine over real sockets.
    #[must_use]
    pub fn fallback(range: PortRange, reason: impl Into<String>) -> Self {
        Self::fallback_with_probe(range, Box::new(SystemProbe), reason)
    }

    /// A fallback engine over `probe`.
    #[must_use]
    pub fn fallback_with_probe(
        range: PortRange,
        probe: Box<dyn PortProbe>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Fallback {
            allocator: FallbackAllocator::with_probe(range, probe),
            reason: reason.into(),
            session: BTreeMap::new(),
        }
    }
}

/// What [`Berth::diagnostics`] reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// `"primary"` or `"fallback"`.
    pub engine: String,
    /// Why fallback is in use.
    pub fallback_reason: Option<String>,
    /// Detectors that will run, in pass order.
    pub detectors: Vec<Detector>,
    /// Detectors disabled or without their tool.
    pub missing_detectors: Vec<Detector>,
    /// Artifact formats with a working serializer.
    pub serializers: Vec<ArtifactFormat>,
    /// Store backend, when the primary engine is in use.
    pub store_backend: Option<String>,
    /// Store location, when the primary engine is in use.
    pub store_location: Option<String>,
    /// The data directory.
    pub data_dir: PathBuf,
}

/// A template expanded and allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateAllocation {
    /// Ports per service.
    pub batch: BatchAllocation,
    /// Definitions after fixed-port conflict resolution.
    pub definitions: Vec<ServiceDefinition>,
    /// Fixed-port rewrites.
    pub conflicts: ConflictResolutionReport,
    /// Dependencies naming services outside the template.
    pub missing_dependencies: Vec<MissingDependency>,
}

/// Entry point for embedding berth.
///
/// # Examples
///
/// ```
/// use berth::facade::{Berth, Engine};
/// use berth::scanner::MockProbe;
/// use berth::{Config, PortRange, ServiceRequest};
///
/// let engine = Engine::fallback_with_probe(
///     PortRange::from_bounds(3000, 3999).unwrap(),
///     Box::new(MockProbe::new()),
///     "forced",
/// );
/// let mut berth = Berth::with_engine(Config::default(), "/tmp/berth-doc", engine);
/// let batch = berth.allocate("demo", &[ServiceRequest::from("web")]).unwrap();
/// assert_eq!(batch.port_of("web"), Some(3000));
/// assert!(berth.is_fallback());
/// ```
pub struct Berth {
    config: Config,
    data_dir: PathBuf,
    registry: ServiceRegistry,
    capabilities: Capabilities,
    engine: Engine,
}

impl Berth {
    /// Builds the primary engine from `config` in `data_dir`, falling back
    /// when it cannot be built or `force_fallback` is set.
    pub fn open(config: Config, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let registry = load_registry(&data_dir);
        let fallback_range = config
            .scan_range()
            .unwrap_or_else(|_| crate::config::defaults::scan_range());

        if config.force_fallback() {
            log::info!("fallback engine forced by configuration");
            return Self::assemble(
                config,
                data_dir,
                registry,
                Capabilities::only(&[Detector::BindTest]),
                Engine::fallback(fallback_range, "forced by configuration"),
            );
        }

        match build_primary(&config, &data_dir, &registry) {
            Ok((allocator, capabilities)) => Self::assemble(
                config,
                data_dir,
                registry,
                capabilities,
                Engine::Primary(allocator),
            ),
            Err(e) => {
                log::warn!("primary engine unavailable ({e}); using bind-probe fallback");
                Self::assemble(
                    config,
                    data_dir,
                    registry,
                    Capabilities::only(&[Detector::BindTest]),
                    Engine::fallback(fallback_range, e.to_string()),
                )
            }
        }
    }

    /// A facade over an explicit engine.
    pub fn with_engine(config: Config, data_dir: impl Into<PathBuf>, engine: Engine) -> Self {
        let data_dir = data_dir.into();
        let capabilities = Capabilities::only(&[Detector::BindTest]);
        let registry = match &engine {
            Engine::Primary(allocator) => allocator.registry().clone(),
            Engine::Fallback { .. } => ServiceRegistry::builtin(),
        };
        Self::assemble(config, data_dir, registry, capabilities, engine)
    }

    fn assemble(
        config: Config,
        data_dir: PathBuf,
        registry: ServiceRegistry,
        capabilities: Capabilities,
        engine: Engine,
    ) -> Self {
        Self {
            config,
            data_dir,
            registry,
            capabilities,
            engine,
        }
    }

    /// The effective configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The service catalog.
    #[must_use]
    pub const fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// The engine in use.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Whether the fallback engine is serving calls.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self.engine, Engine::Fallback { .. })
    }

    /// Allocates `services` for `project` with the configured
    /// auto-resolution setting.
    ///
    /// # Errors
    ///
    /// Returns store and validation errors. Services without a port are
    /// reported in [`BatchAllocation::failed`], not as an error.
    pub fn allocate(&mut self, project: &str, services: &[ServiceRequest]) -> Result<BatchAllocation> {
        let auto_resolve = self.config.auto_resolve();
        self.allocate_with(project, services, auto_resolve)
    }

    /// Like [`Self::allocate`] with an explicit auto-resolution setting.
    ///
    /// # Errors
    ///
    /// See [`Self::allocate`].
    pub fn allocate_with(
        &mut self,
        project: &str,
        services: &[ServiceRequest],
        auto_resolve: bool,
    ) -> Result<BatchAllocation> {
        let batch = match &mut self.engine {
            Engine::Primary(allocator) => {
                allocator.set_auto_resolve(auto_resolve);
                allocator.allocate_batch(project, services)?
            }
            Engine::Fallback {
                allocator, session, ..
            } => {
                allocator.scan();
                let held_ports: BTreeSet<u16> = session
                    .values()
                    .flat_map(BTreeMap::values)
                    .map(|r| r.port().value())
                    .collect();
                let is_held = |name: &str| {
                    session
                        .get(project)
                        .is_some_and(|held| held.contains_key(name))
                };
                let (reused, fresh): (Vec<&ServiceRequest>, Vec<&ServiceRequest>) =
                    services.iter().partition(|r| is_held(&r.name));
                let fresh: Vec<ServiceRequest> = fresh.into_iter().cloned().collect();

                let mut batch = allocator.allocate_excluding(project, &fresh, &held_ports)?;
                let held = session.entry(project.to_string()).or_default();
                for record in &batch.allocated {
                    held.insert(record.service_name().to_string(), record.clone());
                }
                for request in reused {
                    if let Some(record) = held.get(&request.name) {
                        log::debug!(
                            "fallback: reusing {project}/{} -> {}",
                            request.name,
                            record.port()
                        );
                        batch.allocated.push(record.clone());
                    }
                }
                batch
            }
        };
        for failure in &batch.failed {
            log::debug!("{project}: no port for {failure}");
        }
        Ok(batch)
    }

    /// Expands template `name` and allocates its services.
    ///
    /// Fixed ports in the template are de-conflicted first and become
    /// preferred ports; `preferred` entries override them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTemplate`] and the errors of
    /// [`Self::allocate_with`].
    pub fn allocate_template(
        &mut self,
        project: &str,
        name: &str,
        preferred: &BTreeMap<String, u16>,
        auto_resolve: bool,
    ) -> Result<TemplateAllocation> {
        let template = self.registry.template(name)?;
        let conflicts = self.registry.resolve_fixed_port_conflicts(&template.services);
        let missing_dependencies = self.registry.validate_dependencies(&conflicts.definitions);
        for missing in &missing_dependencies {
            log::warn!(
                "template {name}: {} depends on missing service {}",
                missing.service,
                missing.missing
            );
        }

        let requests: Vec<ServiceRequest> = conflicts
            .definitions
            .iter()
            .map(|def| {
                let request = ServiceRequest::new(&def.name).with_type(&def.service_type);
                match preferred.get(&def.name).copied().or(def.fixed_port) {
                    Some(port) => request.prefer(port),
                    None => request,
                }
            })
            .collect();

        let batch = self.allocate_with(project, &requests, auto_resolve)?;
        Ok(TemplateAllocation {
            batch,
            definitions: conflicts.definitions.clone(),
            conflicts,
            missing_dependencies,
        })
    }

    /// Releases one service.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn release(&mut self, project: &str, service: &str) -> Result<bool> {
        match &mut self.engine {
            Engine::Primary(allocator) => allocator.release(project, service),
            Engine::Fallback { session, .. } => Ok(session
                .get_mut(project)
                .and_then(|held| held.remove(service))
                .is_some()),
        }
    }

    /// Releases every service of `project`.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn release_all(&mut self, project: &str) -> Result<usize> {
        match &mut self.engine {
            Engine::Primary(allocator) => allocator.release_all(project),
            Engine::Fallback { session, .. } => {
                Ok(session.remove(project).map_or(0, |held| held.len()))
            }
        }
    }

    /// Active allocations of `project`, by service.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn status(&mut self, project: &str) -> Result<BTreeMap<String, AllocatedPort>> {
        match &mut self.engine {
            Engine::Primary(allocator) => allocator.project_ports(project),
            Engine::Fallback { session, .. } => {
                Ok(session.get(project).cloned().unwrap_or_default())
            }
        }
    }

    /// `(service, url)` for each active HTTP-ish service of `project`.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn urls(&mut self, project: &str) -> Result<Vec<(String, String)>> {
        let ports = self.status(project)?;
        Ok(ports
            .into_iter()
            .filter(|(_, record)| {
                self.registry
                    .get(record.service_type())
                    .is_some_and(|ty| ty.is_http())
            })
            .map(|(service, record)| {
                let url = format!("http://localhost:{}", record.port());
                (service, url)
            })
            .collect())
    }

    /// Names of known projects.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn projects(&mut self) -> Result<Vec<String>> {
        match &mut self.engine {
            Engine::Primary(allocator) => allocator.projects(),
            Engine::Fallback { session, .. } => Ok(session.keys().cloned().collect()),
        }
    }

    /// Ownership, counts and conflicts across every project.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn report(&mut self) -> Result<AllocationReport> {
        match &mut self.engine {
            Engine::Primary(allocator) => allocator.report(),
            Engine::Fallback {
                allocator, session, ..
            } => {
                let ports: BTreeMap<u16, PortOwner> = session
                    .values()
                    .flat_map(BTreeMap::values)
                    .map(|r| {
                        (
                            r.port().value(),
                            PortOwner {
                                project: r.project_name().to_string(),
                                service: r.service_name().to_string(),
                                service_type: r.service_type().to_string(),
                            },
                        )
                    })
                    .collect();
                let conflicts = ports
                    .keys()
                    .filter(|port| !allocator.is_free(**port))
                    .map(|port| {
                        PortInfo::new(
                            *port,
                            PortStatus::OccupiedSystem,
                            Protocol::Tcp,
                            DetectionMethod::BindTest,
                        )
                        .with_description("bind failed")
                    })
                    .collect();
                Ok(AllocationReport {
                    generated_at: chrono::Utc::now(),
                    projects: session.len(),
                    active: ports.len(),
                    inactive: 0,
                    conflicts,
                    ports,
                })
            }
        }
    }

    /// Purges released records; `deep` also expires records unused for
    /// longer than `max_age` (default: the configured expiry).
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn cleanup(&mut self, deep: bool, max_age: Option<Duration>) -> Result<CleanupReport> {
        let max_age = max_age.unwrap_or_else(|| self.config.expire_after());
        match &mut self.engine {
            Engine::Primary(allocator) => allocator.cleanup(deep, max_age),
            Engine::Fallback { .. } => Ok(CleanupReport::default()),
        }
    }

    /// Occupied ports in `range` (default: the configured scan range).
    ///
    /// The primary engine runs a fresh full scan; the fallback engine its
    /// bounded bind probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured scan range is invalid.
    pub fn scan(&mut self, range: Option<PortRange>) -> Result<Vec<PortInfo>> {
        match &mut self.engine {
            Engine::Primary(_) => {
                let mut config = self.config.scanner_config()?;
                if let Some(range) = range {
                    config.range = range;
                }
                let mut scanner = PortScanner::new(&config);
                Ok(scanner.scan(true).values().cloned().collect())
            }
            Engine::Fallback { allocator, .. } => Ok(allocator
                .scan()
                .values()
                .filter(|info| range.map_or(true, |r| r.contains_value(info.port)))
                .cloned()
                .collect()),
        }
    }

    /// Writes artifacts for `project` into `dir`. Definitions of
    /// `template`, when given, shape the compose file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the project has no active
    /// allocations, [`Error::UnknownTemplate`], and write errors.
    pub fn generate(
        &mut self,
        project: &str,
        dir: &Path,
        template: Option<&str>,
    ) -> Result<GeneratedArtifacts> {
        let ports = self.status(project)?;
        if ports.is_empty() {
            return Err(Error::NotFound {
                resource: format!("allocations for project '{project}'"),
            });
        }
        let definitions = match template {
            Some(name) => {
                let template = self.registry.template(name)?;
                self.registry
                    .resolve_fixed_port_conflicts(&template.services)
                    .definitions
            }
            None => Vec::new(),
        };
        ArtifactGenerator::new(project, ports.into_values())
            .with_definitions(definitions)
            .with_serializers(self.capabilities.serializers.clone())
            .generate(dir)
    }

    /// What this instance can do and where it keeps its state.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let (fallback_reason, store_backend, store_location) = match &self.engine {
            Engine::Primary(allocator) => (
                None,
                Some(allocator.store().backend_name().to_string()),
                Some(allocator.store().location()),
            ),
            Engine::Fallback { reason, .. } => (Some(reason.clone()), None, None),
        };
        Diagnostics {
            engine: self.engine.name().to_string(),
            fallback_reason,
            detectors: self.capabilities.detectors.clone(),
            missing_detectors: self.capabilities.missing.clone(),
            serializers: self.capabilities.serializers.clone(),
            store_backend,
            store_location,
            data_dir: self.data_dir.clone(),
        }
    }
}

fn load_registry(data_dir: &Path) -> ServiceRegistry {
    let mut registry = ServiceRegistry::builtin();
    let overrides = data_dir.join(OVERRIDES_FILE);
    if overrides.is_file() {
        match registry.load_overrides(&overrides) {
            Ok(count) => log::debug!("applied {count} service type override(s)"),
            Err(e) => log::warn!("ignoring {}: {e}", overrides.display()),
        }
    }
    registry
}

fn build_primary(
    config: &Config,
    data_dir: &Path,
    registry: &ServiceRegistry,
) -> Result<(PrimaryAllocator, Capabilities)> {
    let scanner_config: ScannerConfig = config.scanner_config()?;
    let extended = config.extended_range()?;

    fs::create_dir_all(data_dir).map_err(|source| Error::Persistence {
        path: data_dir.to_path_buf(),
        source,
    })?;
    let mut store = config.storage_backend().open(data_dir)?;
    store.load()?;
    log::debug!("using {} store at {}", store.backend_name(), store.location());

    let scanner = PortScanner::new(&scanner_config);
    let capabilities = scanner.capabilities().clone();
    let checker: Box<dyn PortChecker> = Box::new(scanner);
    let allocator = PortAllocator::new(store, checker, registry.clone())
        .with_extended_range(extended)
        .with_auto_resolve(config.auto_resolve());
    Ok((allocator, capabilities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::scanner::{MockChecker, MockProbe};
    use crate::store::MemoryStore;

    fn primary() -> Berth {
        let store: Box<dyn AllocationStore> = Box::new(MemoryStore::new());
        let checker: Box<dyn PortChecker> = Box::new(MockChecker::occupied([3000]));
        let allocator = PortAllocator::new(store, checker, ServiceRegistry::builtin());
        Berth::with_engine(Config::default(), "/tmp/unused", Engine::Primary(allocator))
    }

    fn fallback() -> Berth {
        let engine = Engine::fallback_with_probe(
            PortRange::from_bounds(3000, 3999).unwrap(),
            Box::new(MockProbe::occupied([8000])),
            "test",
        );
        Berth::with_engine(Config::default(), "/tmp/unused", engine)
    }

    #[test]
    fn test_primary_allocate_status_urls() {
        let mut berth = primary();
        let batch = berth
            .allocate("demo", &["frontend".into(), "postgres".into()])
            .unwrap();
        assert_eq!(batch.port_of("frontend"), Some(3001));
        assert_eq!(berth.status("demo").unwrap().len(), 2);
        assert_eq!(
            berth.urls("demo").unwrap(),
            vec![("frontend".to_string(), "http://localhost:3001".to_string())]
        );
        assert!(berth.release("demo", "postgres").unwrap());
        assert_eq!(berth.status("demo").unwrap().len(), 1);
    }

    #[test]
    fn test_template_expansion() {
        let mut berth = primary();
        let out = berth
            .allocate_template("shop", "mern", &BTreeMap::from([("backend".into(), 8050)]), true)
            .unwrap();
        assert!(out.batch.is_complete());
        assert_eq!(out.batch.port_of("backend"), Some(8050));
        assert_eq!(out.batch.port_of("mongodb"), Some(27018));
        assert!(out.missing_dependencies.is_empty());
        assert!(berth
            .allocate_template("shop", "nope", &BTreeMap::new(), true)
            .is_err());
    }

    #[test]
    fn test_fallback_session() {
        let mut berth = fallback();
        let batch = berth
            .allocate("demo", &["web".into(), "api".into(), "db".into()])
            .unwrap();
        assert_eq!(batch.allocated.len(), 3);
        assert_eq!(batch.port_of("api"), Some(8001));
        assert_eq!(berth.status("demo").unwrap().len(), 3);
        assert_eq!(berth.report().unwrap().active, 3);
        assert_eq!(berth.release_all("demo").unwrap(), 3);
        assert!(berth.cleanup(true, None).unwrap().is_empty());
    }

    fn fallback_over(probe: impl PortProbe + 'static) -> Berth {
        let engine = Engine::fallback_with_probe(
            PortRange::from_bounds(3000, 3999).unwrap(),
            Box::new(probe),
            "test",
        );
        Berth::with_engine(Config::default(), "/tmp/unused", engine)
    }

    /// Occupied set that can change after construction.
    #[derive(Clone, Default)]
    struct SharedOccupancy(Rc<RefCell<BTreeSet<u16>>>);

    impl PortProbe for SharedOccupancy {
        fn is_free(&self, port: u16, _protocol: Protocol) -> bool {
            !self.0.borrow().contains(&port)
        }
    }

    #[test]
    fn test_fallback_ports_distinct_across_calls() {
        let mut berth = fallback_over(MockProbe::new());
        let first = berth.allocate("alpha", &["web".into()]).unwrap();
        let second = berth.allocate("beta", &["ui".into()]).unwrap();
        let third = berth.allocate("alpha", &["client".into()]).unwrap();

        let ports: BTreeSet<u16> = [
            first.port_of("web"),
            second.port_of("ui"),
            third.port_of("client"),
        ]
        .into_iter()
        .flatten()
        .collect();
        assert_eq!(ports.len(), 3);
        assert_eq!(berth.report().unwrap().active, 3);
    }

    #[test]
    fn test_fallback_repeat_request_reuses_port() {
        let mut berth = fallback_over(MockProbe::new());
        let first = berth.allocate("alpha", &["web".into()]).unwrap();
        let again = berth
            .allocate("alpha", &["web".into(), "api".into()])
            .unwrap();
        assert_eq!(again.port_of("web"), first.port_of("web"));
        assert_eq!(again.allocated.len(), 2);
        assert_eq!(berth.status("alpha").unwrap().len(), 2);
    }

    #[test]
    fn test_fallback_template_then_single_service() {
        let mut berth = fallback_over(MockProbe::new());
        let out = berth
            .allocate_template("demo", "mern", &BTreeMap::new(), true)
            .unwrap();
        let batch = berth.allocate("demo", &["web".into()]).unwrap();

        let web = batch.port_of("web").unwrap();
        assert!(out.batch.allocated.iter().all(|r| r.port().value() != web));
        let held: BTreeSet<u16> = berth
            .status("demo")
            .unwrap()
            .values()
            .map(|r| r.port().value())
            .collect();
        assert_eq!(held.len(), out.batch.allocated.len() + 1);
    }

    #[test]
    fn test_fallback_report_checks_session_ports() {
        let occupancy = SharedOccupancy::default();
        let mut berth = fallback_over(occupancy.clone());
        berth
            .allocate("demo", &[ServiceRequest::from("thing").prefer(45678)])
            .unwrap();
        assert!(berth.report().unwrap().conflicts.is_empty());

        occupancy.0.borrow_mut().insert(45678);
        let report = berth.report().unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].port, 45678);
    }

    #[test]
    fn test_diagnostics() {
        let diag = fallback().diagnostics();
        assert_eq!(diag.engine, "fallback");
        assert_eq!(diag.fallback_reason.as_deref(), Some("test"));
        assert!(diag.store_backend.is_none());

        let diag = primary().diagnostics();
        assert_eq!(diag.engine, "primary");
        assert_eq!(diag.store_backend.as_deref(), Some("memory"));
    }

    #[test]
    fn test_unusable_data_dir_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let berth = Berth::open(Config::default(), blocker.join("data"));
        assert!(berth.is_fallback());
        assert!(berth.diagnostics().fallback_reason.is_some());
    }

    #[test]
    fn test_generate_requires_allocations() {
        let dir = tempfile::tempdir().unwrap();
        let mut berth = primary();
        assert!(matches!(
            berth.generate("demo", dir.path(), None),
            Err(Error::NotFound { .. })
        ));
        berth.allocate("demo", &["web".into()]).unwrap();
        let out = berth.generate("demo", dir.path(), None).unwrap();
        assert!(out.path_of(ArtifactFormat::Env).is_some());
    }
}
