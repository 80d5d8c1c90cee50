//! Cleanup command implementation.
//!
//! Purges released and superseded records. `--deep` also expires active
//! records nobody has asked for in a while.

use std::io::Write;

use berth::allocator::PurgeReason;
use clap::Args;

use crate::error::CliError;
use crate::utils::{open_berth, GlobalOptions};

/// Purge released records.
#[derive(Args)]
pub struct CleanupCommand {
    /// Also expire active records unused for longer than the expiry age
    #[arg(long)]
    pub deep: bool,

    /// Expiry age in days for --deep (default: configuration)
    #[arg(long, value_name = "DAYS", requires = "deep")]
    pub max_age_days: Option<u32>,

    /// Print the purged records as JSON
    #[arg(long)]
    pub json: bool,
}

impl CleanupCommand {
    /// Execute the cleanup command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let mut berth = open_berth(global)?;
        if berth.is_fallback() && !global.quiet {
            eprintln!("note: nothing is stored in fallback mode; nothing to clean up");
        }

        let max_age = self
            .max_age_days
            .map(|days| chrono::Duration::days(i64::from(days)));
        let report = berth.cleanup(self.deep, max_age)?;

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        if self.json {
            serde_json::to_writer_pretty(&mut handle, &report)?;
            writeln!(handle)?;
            return Ok(());
        }

        if report.is_empty() {
            if !global.quiet {
                writeln!(handle, "Nothing to clean up.")?;
            }
            return Ok(());
        }

        for record in &report.purged {
            writeln!(
                handle,
                "purged {}/{} (port {}, {})",
                record.project,
                record.service,
                record.port,
                reason_label(record.reason)
            )?;
        }
        for project in &report.removed_projects {
            writeln!(handle, "removed empty project {project}")?;
        }
        if !global.quiet {
            writeln!(
                handle,
                "{} released, {} superseded, {} expired",
                report.count(PurgeReason::Released),
                report.count(PurgeReason::Retired),
                report.count(PurgeReason::Expired),
            )?;
        }

        Ok(())
    }
}

const fn reason_label(reason: PurgeReason) -> &'static str {
    match reason {
        PurgeReason::Released => "released",
        PurgeReason::Retired => "superseded",
        PurgeReason::Expired => "expired",
    }
}
