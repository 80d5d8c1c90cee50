//! Doctor command implementation.
//!
//! Reports which engine serves requests and why, which detectors and
//! serializers work on this host, and where allocations are kept.

use std::io::Write;

use berth::Diagnostics;
use clap::Args;

use crate::error::CliError;
use crate::utils::{open_berth, shorten_path, GlobalOptions};

/// Report the engine, detectors and store in use.
#[derive(Args)]
pub struct DoctorCommand {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl DoctorCommand {
    /// Execute the doctor command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let berth = open_berth(global)?;
        let diagnostics = berth.diagnostics();

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if self.json {
            serde_json::to_writer_pretty(&mut handle, &diagnostics)?;
            writeln!(handle)?;
        } else {
            write_report(&mut handle, &diagnostics)?;
        }
        Ok(())
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn write_report(out: &mut impl Write, d: &Diagnostics) -> Result<(), CliError> {
    match d.fallback_reason {
        Some(ref reason) => writeln!(out, "engine:      {} ({reason})", d.engine)?,
        None => writeln!(out, "engine:      {}", d.engine)?,
    }
    writeln!(out, "detectors:   {}", join(&d.detectors))?;
    writeln!(out, "missing:     {}", join(&d.missing_detectors))?;
    writeln!(out, "serializers: {}", join(&d.serializers))?;
    writeln!(
        out,
        "store:       {}",
        match (&d.store_backend, &d.store_location) {
            (Some(backend), Some(location)) => format!("{backend} at {location}"),
            (Some(backend), None) => backend.clone(),
            _ => "none (allocations are not saved)".to_string(),
        }
    )?;
    writeln!(out, "data dir:    {}", shorten_path(&d.data_dir))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth::Detector;
    use std::path::PathBuf;

    #[test]
    fn test_report_for_fallback() {
        let diagnostics = Diagnostics {
            engine: "fallback".into(),
            fallback_reason: Some("forced by configuration".into()),
            detectors: vec![Detector::BindTest],
            missing_detectors: Vec::new(),
            serializers: Vec::new(),
            store_backend: None,
            store_location: None,
            data_dir: PathBuf::from("/var/tmp/berth"),
        };
        let mut out = Vec::new();
        write_report(&mut out, &diagnostics).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("engine:      fallback (forced by configuration)"));
        assert!(text.contains("missing:     none"));
        assert!(text.contains("store:       none (allocations are not saved)"));
        assert!(text.contains("data dir:    /var/tmp/berth"));
    }
}
