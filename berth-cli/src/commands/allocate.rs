//! Allocate command implementation.
//!
//! Allocates ports for named services and/or the services of a template.
//! Services left without a port are reported on stderr; they do not make
//! the command fail.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use berth::output::{EnvFormatter, ExportFormatter, HumanFormatter, JsonFormatter, OutputFormatter};
use berth::{AllocatedPort, BatchAllocation, ServiceRequest, ShellType};
use clap::{Args, ValueEnum};

use crate::error::CliError;
use crate::utils::{open_berth, parse_preference, resolve_project, shorten_path, GlobalOptions};

/// Allocate ports for services of the current project.
#[derive(Args)]
pub struct AllocateCommand {
    /// Services to allocate, as NAME or NAME:TYPE
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,

    /// Also allocate every service of this template
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,

    /// Preferred port for a service (repeatable)
    #[arg(long, value_name = "SERVICE=PORT", value_parser = parse_preference)]
    pub prefer: Vec<(String, u16)>,

    /// Do not fall back to the extended range when a type range is full
    #[arg(long)]
    pub no_auto_resolve: bool,

    /// Write .env, ports.sh, ports.json and docker-compose.yml into DIR
    #[arg(long, value_name = "DIR")]
    pub generate: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "human", ignore_case = true)]
    pub format: AllocateFormat,
}

/// Output format for the allocate command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum AllocateFormat {
    /// Aligned listing
    Human,
    /// JSON document
    Json,
    /// `.env` lines
    Env,
    /// Shell export statements for the current shell
    Export,
}

impl AllocateFormat {
    fn formatter(self) -> Box<dyn OutputFormatter> {
        match self {
            Self::Human => Box::new(HumanFormatter),
            Self::Json => Box::new(JsonFormatter),
            Self::Env => Box::new(EnvFormatter),
            Self::Export => Box::new(ExportFormatter::new(ShellType::detect())),
        }
    }
}

/// Parse `NAME` or `NAME:TYPE`.
fn parse_service(spec: &str) -> Result<ServiceRequest, CliError> {
    let (name, service_type) = match spec.split_once(':') {
        Some((name, ty)) => (name.trim(), Some(ty.trim())),
        None => (spec.trim(), None),
    };
    if name.is_empty() {
        return Err(CliError::InvalidArguments(format!(
            "missing service name in '{spec}'"
        )));
    }
    let request = ServiceRequest::new(name);
    Ok(match service_type {
        Some(ty) if !ty.is_empty() => request.with_type(ty),
        _ => request,
    })
}

impl AllocateCommand {
    /// Execute the allocate command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        if self.services.is_empty() && self.template.is_none() {
            return Err(CliError::InvalidArguments(
                "name at least one service or pass --template".into(),
            ));
        }

        let mut berth = open_berth(global)?;
        let project = resolve_project(global, berth.config())?;
        let auto_resolve = !self.no_auto_resolve && berth.config().auto_resolve();
        let preferred: BTreeMap<String, u16> = self.prefer.iter().cloned().collect();

        let mut batch = BatchAllocation::default();

        if let Some(ref name) = self.template {
            let expanded = berth.allocate_template(&project, name, &preferred, auto_resolve)?;
            if !global.quiet {
                for moved in &expanded.conflicts.reassigned {
                    eprintln!(
                        "note: {} moved from fixed port {} to {} to avoid a clash",
                        moved.service, moved.from, moved.to
                    );
                }
                for service in &expanded.conflicts.unresolved {
                    eprintln!("warning: no conflict-free fixed port for {service}");
                }
                for missing in &expanded.missing_dependencies {
                    eprintln!(
                        "warning: {} depends on {}, which the template does not define",
                        missing.service, missing.missing
                    );
                }
            }
            batch.allocated.extend(expanded.batch.allocated);
            batch.failed.extend(expanded.batch.failed);
        }

        if !self.services.is_empty() {
            let requests = self
                .services
                .iter()
                .map(|spec| {
                    parse_service(spec).map(|request| match preferred.get(&request.name) {
                        Some(&port) => request.prefer(port),
                        None => request,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let extra = berth.allocate_with(&project, &requests, auto_resolve)?;
            batch.allocated.extend(extra.allocated);
            batch.failed.extend(extra.failed);
        }

        for failure in &batch.failed {
            eprintln!("warning: could not allocate {failure}");
        }

        let allocations: BTreeMap<String, AllocatedPort> = batch
            .allocated
            .into_iter()
            .map(|record| (record.service_name().to_string(), record))
            .collect();
        let rendered = self.format.formatter().format(&project, &allocations)?;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{rendered}")?;

        if let Some(dir) = self.generate {
            let written = berth.generate(&project, &dir, self.template.as_deref())?;
            if !global.quiet {
                for file in &written.files {
                    eprintln!("wrote {}", shorten_path(file));
                }
                for format in &written.degraded {
                    eprintln!("note: {format} written in degraded mode");
                }
            }
        }

        Ok(())
    }
}
