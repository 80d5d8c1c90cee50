//! Shell completion generation command.

use std::io;

use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::error::CliError;
use crate::utils::GlobalOptions;

/// Name of the installed binary.
const BIN_NAME: &str = "berth";

/// Generate shell completion scripts
#[derive(Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    /// Execute the completions command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let mut cmd = Cli::command();

        if !global.quiet {
            print_instructions(self.shell);
        }

        generate(self.shell, &mut cmd, BIN_NAME, &mut io::stdout());
        Ok(())
    }
}

fn print_instructions(shell: Shell) {
    eprintln!("# Generating {shell} completion script");
    match shell {
        Shell::Bash => {
            eprintln!("#   berth completions bash > ~/.local/share/bash-completion/completions/berth");
            eprintln!("# Or in ~/.bashrc:");
            eprintln!("#   eval \"$(berth completions bash)\"");
        }
        Shell::Zsh => {
            eprintln!("#   berth completions zsh > ~/.zsh/completions/_berth");
            eprintln!("# Make sure ~/.zsh/completions is in your $fpath");
        }
        Shell::Fish => {
            eprintln!("#   berth completions fish > ~/.config/fish/completions/berth.fish");
        }
        Shell::PowerShell => {
            eprintln!("#   berth completions powershell | Out-String | Invoke-Expression");
        }
        _ => {}
    }
    eprintln!();
}
