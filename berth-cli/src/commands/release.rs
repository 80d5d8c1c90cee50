//! Release command implementation.
//!
//! Releasing marks records inactive; the port becomes available to other
//! allocations at once, and the record itself stays until `cleanup`.

use clap::Args;

use crate::error::CliError;
use crate::utils::{open_berth, resolve_project, GlobalOptions};

/// Release one service's port, or all of the project's.
#[derive(Args)]
pub struct ReleaseCommand {
    /// Service to release
    #[arg(value_name = "SERVICE", required_unless_present = "all", conflicts_with = "all")]
    pub service: Option<String>,

    /// Release every service of the project
    #[arg(long)]
    pub all: bool,
}

impl ReleaseCommand {
    /// Execute the release command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let mut berth = open_berth(global)?;
        let project = resolve_project(global, berth.config())?;

        if self.all {
            let count = berth.release_all(&project)?;
            if !global.quiet {
                eprintln!("Released {count} allocation(s) for {project}");
            }
            return Ok(());
        }

        let Some(service) = self.service else {
            return Err(CliError::InvalidArguments(
                "name a service or pass --all".into(),
            ));
        };

        if berth.release(&project, &service)? {
            if !global.quiet {
                eprintln!("Released {service} for {project}");
            }
        } else if !global.quiet {
            eprintln!("No active allocation for {service} in {project}");
        }
        Ok(())
    }
}
