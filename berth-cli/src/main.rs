//! Main entry point for the berth CLI.
//!
//! Commands:
//! - `scan`: Show occupied ports
//! - `allocate`: Allocate ports for a project's services
//! - `release`: Release allocations
//! - `status`: Show a project's allocations
//! - `generate`, `up`, `down`: Write artifacts and drive docker compose
//! - `cleanup`, `doctor`, `templates`, `completions`

mod cli;
mod commands;
mod error;
mod utils;

use clap::Parser;
use cli::Cli;
use utils::GlobalOptions;

fn main() {
    let cli = Cli::parse();

    berth::init_logger(cli.verbose, cli.quiet).install();

    let global = GlobalOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        data_dir: cli.data_dir,
        local: cli.local,
        project: cli.project,
        fallback: cli.fallback,
    };

    let result = match cli.command {
        cli::Command::Scan(cmd) => cmd.execute(&global),
        cli::Command::Allocate(cmd) => cmd.execute(&global),
        cli::Command::Release(cmd) => cmd.execute(&global),
        cli::Command::Status(cmd) => cmd.execute(&global),
        cli::Command::Generate(cmd) => cmd.execute(&global),
        cli::Command::Up(cmd) => cmd.execute(&global),
        cli::Command::Down(cmd) => cmd.execute(&global),
        cli::Command::Cleanup(cmd) => cmd.execute(&global),
        cli::Command::Doctor(cmd) => cmd.execute(&global),
        cli::Command::Templates(cmd) => cmd.execute(&global),
        cli::Command::Completions(cmd) => cmd.execute(&global),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
