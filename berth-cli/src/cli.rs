//! CLI structure and command definitions.
//!
//! This module defines the main CLI structure using clap's derive macros,
//! including global options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{
    AllocateCommand, CleanupCommand, CompletionsCommand, DoctorCommand, DownCommand,
    GenerateCommand, ReleaseCommand, ScanCommand, StatusCommand, TemplatesCommand, UpCommand,
};

/// Allocate non-conflicting ports to the services of local projects.
#[derive(Parser)]
#[command(name = "berth")]
#[command(version, about = "Allocate non-conflicting ports for local service stacks", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Override the data directory location
    #[arg(long, value_name = "PATH", global = true, env = "BERTH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep allocations in ./.berth instead of the global data directory
    #[arg(long, global = true)]
    pub local: bool,

    /// Project name (defaults to configuration, then the directory name)
    #[arg(long, value_name = "NAME", global = true, env = "BERTH_PROJECT")]
    pub project: Option<String>,

    /// Use bind-probe allocation only; nothing is saved
    #[arg(long, global = true)]
    pub fallback: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Command {
    /// Show which ports are in use on this machine
    Scan(ScanCommand),

    /// Allocate ports for services of the current project
    Allocate(AllocateCommand),

    /// Release one service's port, or all of the project's
    Release(ReleaseCommand),

    /// Show the project's allocations
    Status(StatusCommand),

    /// Write .env, ports.sh, ports.json and docker-compose.yml
    Generate(GenerateCommand),

    /// Generate artifacts and start the stack with docker compose
    Up(UpCommand),

    /// Stop the stack started by `up`
    Down(DownCommand),

    /// Purge released records; --deep also expires unused ones
    Cleanup(CleanupCommand),

    /// Report the engine, detectors and store in use
    Doctor(DoctorCommand),

    /// List project templates or show one
    Templates(TemplatesCommand),

    /// Generate shell completion scripts
    Completions(CompletionsCommand),
}
