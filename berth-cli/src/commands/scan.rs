//! Scan command implementation.
//!
//! Lists the ports a fresh scan reports as not available, optionally
//! narrowed to a range or a single status.

use std::io::Write;

use berth::{PortInfo, PortRange, PortStatus};
use clap::Args;

use crate::error::CliError;
use crate::utils::{open_berth, GlobalOptions, TableFormat};

const COLUMN_HEADERS: [&str; 6] = ["port", "status", "protocol", "owner", "method", "description"];

/// Show which ports are in use.
#[derive(Args)]
pub struct ScanCommand {
    /// Lowest port to scan (default: configured scan range)
    #[arg(long, value_name = "PORT")]
    pub min: Option<u16>,

    /// Highest port to scan (default: configured scan range)
    #[arg(long, value_name = "PORT")]
    pub max: Option<u16>,

    /// Only show ports with this status (e.g. occupied_system, reserved)
    #[arg(long, value_name = "STATUS", value_parser = parse_status)]
    pub status: Option<PortStatus>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", ignore_case = true)]
    pub format: TableFormat,
}

fn parse_status(s: &str) -> Result<PortStatus, String> {
    PortStatus::parse(s).ok_or_else(|| {
        format!(
            "unknown status '{s}' (expected available, occupied_system, \
             occupied_container, reserved or unknown)"
        )
    })
}

impl ScanCommand {
    /// Execute the scan command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let mut berth = open_berth(global)?;

        let range = if self.min.is_some() || self.max.is_some() {
            let configured = berth.config().scanner_config()?.range;
            let min = self.min.unwrap_or_else(|| configured.min().value());
            let max = self.max.unwrap_or_else(|| configured.max().value());
            Some(
                PortRange::from_bounds(min, max)
                    .map_err(|e| CliError::InvalidArguments(e.to_string()))?,
            )
        } else {
            None
        };

        let mut ports = berth.scan(range)?;
        if let Some(status) = self.status {
            ports.retain(|info| info.status == status);
        }
        ports.sort_by_key(|info| info.port);
        log::debug!("scan returned {} port(s)", ports.len());

        match self.format {
            TableFormat::Table => format_as_table(&ports, global.quiet),
            TableFormat::Json => format_as_json(&ports),
            TableFormat::Csv => format_as_csv(&ports),
        }
    }
}

fn format_as_table(ports: &[PortInfo], quiet: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    if ports.is_empty() {
        if !quiet {
            writeln!(handle, "No occupied ports found.")?;
        }
        return Ok(());
    }

    let header_line = COLUMN_HEADERS
        .iter()
        .map(|s| s.to_uppercase())
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(handle, "{header_line}")?;

    for info in ports {
        writeln!(
            handle,
            "{}\t{}\t{}\t{}\t{}\t{}",
            info.port,
            info.status,
            info.protocol,
            info.owner().unwrap_or("-"),
            info.detection_method,
            info.description,
        )?;
    }

    Ok(())
}

fn format_as_json(ports: &[PortInfo]) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, ports)?;
    writeln!(handle)?;
    Ok(())
}

fn format_as_csv(ports: &[PortInfo]) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::WriterBuilder::new().from_writer(handle);

    writer.write_record(COLUMN_HEADERS)?;
    for info in ports {
        writer.write_record([
            info.port.to_string(),
            info.status.to_string(),
            info.protocol.to_string(),
            info.owner().unwrap_or_default().to_string(),
            info.detection_method.to_string(),
            info.description.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
