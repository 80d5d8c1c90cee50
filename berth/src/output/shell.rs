//! Shell flavours for export scripts.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Shell dialect of an export script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellType {
    /// Bourne Again Shell.
    #[default]
    Bash,
    /// Z Shell.
    Zsh,
    /// Friendly Interactive Shell.
    Fish,
    /// `PowerShell`.
    PowerShell,
}

impl ShellType {
    /// Guesses the invoking shell.
    ///
    /// `ZSH_VERSION`, `FISH_VERSION` and `PSModulePath` are checked first,
    /// then the `SHELL` path. Anything unrecognised is bash.
    #[must_use]
    pub fn detect() -> Self {
        if env::var_os("ZSH_VERSION").is_some() {
            return Self::Zsh;
        }
        if env::var_os("FISH_VERSION").is_some() {
            return Self::Fish;
        }
        if env::var_os("PSModulePath").is_some() {
            return Self::PowerShell;
        }
        env::var("SHELL").map_or(Self::Bash, |path| Self::from_path(&path))
    }

    fn from_path(path: &str) -> Self {
        if path.contains("zsh") {
            Self::Zsh
        } else if path.contains("fish") {
            Self::Fish
        } else if path.contains("pwsh") || path.contains("powershell") {
            Self::PowerShell
        } else {
            Self::Bash
        }
    }

    /// One export statement.
    ///
    /// ```
    /// use berth::output::ShellType;
    ///
    /// assert_eq!(ShellType::Bash.format_export("WEB_PORT", "3000"), "export WEB_PORT=3000");
    /// assert_eq!(ShellType::Fish.format_export("WEB_PORT", "3000"), "set -gx WEB_PORT 3000");
    /// assert_eq!(ShellType::PowerShell.format_export("WEB_PORT", "3000"), "$env:WEB_PORT=\"3000\"");
    /// ```
    #[must_use]
    pub fn format_export(self, var: &str, value: &str) -> String {
        match self {
            Self::Bash | Self::Zsh => format!("export {var}={value}"),
            Self::Fish => format!("set -gx {var} {value}"),
            Self::PowerShell => format!("$env:{var}=\"{value}\""),
        }
    }

    /// First line of a script for this shell.
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Bash => "#!/usr/bin/env bash",
            Self::Zsh => "#!/usr/bin/env zsh",
            Self::Fish => "#!/usr/bin/env fish",
            Self::PowerShell => "#!/usr/bin/env pwsh",
        }
    }
}

impl fmt::Display for ShellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::PowerShell => "powershell",
        })
    }
}

impl FromStr for ShellType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bash" | "sh" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            "fish" => Ok(Self::Fish),
            "powershell" | "pwsh" | "ps" => Ok(Self::PowerShell),
            _ => Err(Error::Validation {
                field: "shell".into(),
                message: format!("unknown shell '{s}': expected bash, zsh, fish or powershell"),
            }),
        }
    }
}
