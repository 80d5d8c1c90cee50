//! Generate command implementation.

use std::path::PathBuf;

use berth::output::GeneratedArtifacts;
use clap::Args;

use crate::error::CliError;
use crate::utils::{open_berth, output_dir, resolve_project, shorten_path, GlobalOptions};

/// Write .env, ports.sh, ports.json and docker-compose.yml.
#[derive(Args)]
pub struct GenerateCommand {
    /// Directory to write into (default: current directory)
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Shape the compose file with this template's service definitions
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,
}

impl GenerateCommand {
    /// Execute the generate command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let dir = output_dir(self.output)?;
        generate(global, &dir, self.template.as_deref()).map(|_| ())
    }
}

/// Writes the project's artifacts into `dir` and reports them on stderr.
pub(crate) fn generate(
    global: &GlobalOptions,
    dir: &std::path::Path,
    template: Option<&str>,
) -> Result<(String, GeneratedArtifacts), CliError> {
    let mut berth = open_berth(global)?;
    let project = resolve_project(global, berth.config())?;
    let written = berth.generate(&project, dir, template)?;

    if !global.quiet {
        for file in &written.files {
            eprintln!("wrote {}", shorten_path(file));
        }
        for format in &written.degraded {
            eprintln!("note: {format} written in degraded mode");
        }
    }

    Ok((project, written))
}
