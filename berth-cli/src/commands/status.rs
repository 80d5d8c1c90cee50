//! Status command implementation.
//!
//! Shows the active allocations of the current project, or the URLs of
//! its HTTP services with `--urls`.

use std::collections::BTreeMap;
use std::io::Write;

use berth::AllocatedPort;
use clap::Args;
use serde::Serialize;

use crate::error::CliError;
use crate::utils::{format_timestamp, open_berth, resolve_project, GlobalOptions, TableFormat};

const COLUMN_HEADERS: [&str; 6] = [
    "service",
    "port",
    "type",
    "resolution",
    "allocated_at",
    "last_used",
];

#[derive(Serialize)]
struct ServiceUrl<'a> {
    service: &'a str,
    url: &'a str,
}

/// Show the project's allocations.
#[derive(Args)]
pub struct StatusCommand {
    /// Print http://localhost:<port> for each HTTP service instead
    #[arg(long)]
    pub urls: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table", ignore_case = true)]
    pub format: TableFormat,
}

impl StatusCommand {
    /// Execute the status command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let mut berth = open_berth(global)?;
        let project = resolve_project(global, berth.config())?;

        if self.urls {
            let urls = berth.urls(&project)?;
            return print_urls(&urls, self.format);
        }

        let ports = berth.status(&project)?;
        match self.format {
            TableFormat::Table => format_as_table(&project, &ports, global.quiet),
            TableFormat::Json => format_as_json(&ports),
            TableFormat::Csv => format_as_csv(&ports),
        }
    }
}

fn print_urls(urls: &[(String, String)], format: TableFormat) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match format {
        TableFormat::Table => {
            for (service, url) in urls {
                writeln!(handle, "{service}\t{url}")?;
            }
        }
        TableFormat::Json => {
            let entries: Vec<ServiceUrl<'_>> = urls
                .iter()
                .map(|(service, url)| ServiceUrl { service, url })
                .collect();
            serde_json::to_writer_pretty(&mut handle, &entries)?;
            writeln!(handle)?;
        }
        TableFormat::Csv => {
            let mut writer = csv::WriterBuilder::new().from_writer(handle);
            writer.write_record(["service", "url"])?;
            for (service, url) in urls {
                writer.write_record([service, url])?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn format_as_table(
    project: &str,
    ports: &BTreeMap<String, AllocatedPort>,
    quiet: bool,
) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    if ports.is_empty() {
        if !quiet {
            writeln!(handle, "No ports allocated for {project}.")?;
        }
        return Ok(());
    }

    let header_line = COLUMN_HEADERS
        .iter()
        .map(|s| s.to_uppercase())
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(handle, "{header_line}")?;

    for (service, record) in ports {
        writeln!(
            handle,
            "{}\t{}\t{}\t{}\t{}\t{}",
            service,
            record.port(),
            record.service_type(),
            record.conflict_resolution(),
            format_timestamp(record.allocated_at()),
            format_timestamp(record.last_used()),
        )?;
    }

    Ok(())
}

fn format_as_json(ports: &BTreeMap<String, AllocatedPort>) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, ports)?;
    writeln!(handle)?;
    Ok(())
}

fn format_as_csv(ports: &BTreeMap<String, AllocatedPort>) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::WriterBuilder::new().from_writer(handle);

    writer.write_record(COLUMN_HEADERS)?;
    for (service, record) in ports {
        writer.write_record([
            service.clone(),
            record.port().to_string(),
            record.service_type().to_string(),
            record.conflict_resolution().to_string(),
            record.allocated_at().to_rfc3339(),
            record.last_used().to_rfc3339(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
