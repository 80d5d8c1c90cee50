//! `up` and `down`: drive `docker compose` with the generated compose file.

use std::path::{Path, PathBuf};
use std::process::Command;

use berth::output::compose_project_name;
use berth::ArtifactFormat;
use clap::Args;

use crate::commands::generate::generate;
use crate::error::CliError;
use crate::utils::{load_configuration, output_dir, resolve_project, GlobalOptions};

/// Generate artifacts and start the stack.
#[derive(Args)]
pub struct UpCommand {
    /// Directory holding the generated files (default: current directory)
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Shape the compose file with this template's service definitions
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,
}

impl UpCommand {
    /// Execute the up command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let dir = output_dir(self.output)?;
        let (project, written) = generate(global, &dir, self.template.as_deref())?;
        let compose_file = written
            .path_of(ArtifactFormat::Compose)
            .map(Path::to_path_buf)
            .ok_or_else(|| CliError::Compose("no compose file was generated".into()))?;
        run_compose(&compose_file, &project, &["up", "-d"])
    }
}

/// Stop the stack started by `up`.
#[derive(Args)]
pub struct DownCommand {
    /// Directory holding the generated files (default: current directory)
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

impl DownCommand {
    /// Execute the down command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let dir = output_dir(self.output)?;
        let compose_file = dir.join(ArtifactFormat::Compose.file_name());
        if !compose_file.is_file() {
            return Err(CliError::NotFound(format!(
                "{} not found; run `berth up` first",
                compose_file.display()
            )));
        }
        let config = load_configuration(global)?;
        let project = resolve_project(global, &config)?;
        run_compose(&compose_file, &project, &["down"])
    }
}

fn compose_args(compose_file: &Path, project: &str, action: &[&str]) -> Vec<String> {
    let mut args = vec![
        "compose".to_string(),
        "-f".to_string(),
        compose_file.display().to_string(),
        "-p".to_string(),
        compose_project_name(project),
    ];
    args.extend(action.iter().map(|s| (*s).to_string()));
    args
}

fn run_compose(compose_file: &Path, project: &str, action: &[&str]) -> Result<(), CliError> {
    let args = compose_args(compose_file, project, action);
    log::debug!("running docker {}", args.join(" "));

    let status = Command::new("docker")
        .args(&args)
        .status()
        .map_err(|e| CliError::Compose(format!("cannot run docker: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(CliError::Compose(match status.code() {
            Some(code) => format!("`docker {}` exited with status {code}", action.join(" ")),
            None => format!("`docker {}` was terminated by a signal", action.join(" ")),
        }))
    }
}
