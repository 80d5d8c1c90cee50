//! Templates command implementation.

use std::io::Write;

use berth::registry::ProjectTemplate;
use berth::ServiceRegistry;
use clap::Args;

use crate::error::CliError;
use crate::utils::GlobalOptions;

/// List project templates or show one.
#[derive(Args)]
pub struct TemplatesCommand {
    /// Template to show in detail
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl TemplatesCommand {
    /// Execute the templates command.
    pub fn execute(self, _global: &GlobalOptions) -> Result<(), CliError> {
        let registry = ServiceRegistry::builtin();
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        match self.name {
            Some(name) => {
                let template = registry.template(&name)?;
                if self.json {
                    serde_json::to_writer_pretty(&mut handle, template)?;
                    writeln!(handle)?;
                } else {
                    show_template(&mut handle, template)?;
                }
            }
            None => {
                let templates: Vec<&ProjectTemplate> = registry.templates().collect();
                if self.json {
                    serde_json::to_writer_pretty(&mut handle, &templates)?;
                    writeln!(handle)?;
                } else {
                    let width = templates.iter().map(|t| t.name.len()).max().unwrap_or(0);
                    for template in templates {
                        writeln!(handle, "{:<width$}  {}", template.name, template.description)?;
                    }
                }
            }
        }

        Ok(())
    }
}

fn show_template(out: &mut impl Write, template: &ProjectTemplate) -> Result<(), CliError> {
    writeln!(out, "{}: {}", template.name, template.description)?;
    writeln!(out, "SERVICE\tTYPE\tPORT\tIMAGE\tDEPENDS_ON")?;
    for service in &template.services {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            service.name,
            service.service_type,
            service
                .fixed_port
                .map_or_else(|| "-".to_string(), |p| p.to_string()),
            service.image.as_deref().unwrap_or("-"),
            if service.depends_on.is_empty() {
                "-".to_string()
            } else {
                service.depends_on.join(",")
            },
        )?;
    }
    Ok(())
}
