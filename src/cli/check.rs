//! Compile a resource and report what it declares and includes.
//!
//! Compilation errors (unbalanced blocks, bad expressions, missing extends
//! slots) fail the command, so `check` doubles as a template linter:
//!
//! ```bash
//! handlebar check views/page.html
//! handlebar check views/page.html --format json
//! ```

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use super::common::{CommandContext, CommandExecutor};
use crate::reference::{TemplateRef, resolve_resource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments of `handlebar check`
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Resource to compile; a `#fragment` is ignored
    reference: String,

    /// Also load every resource reached through static includes
    #[arg(long)]
    follow: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct IncludeReport {
    target: String,
    resolved: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    resource: String,
    sub_templates: Vec<String>,
    includes: Vec<IncludeReport>,
}

impl CommandExecutor for CheckCommand {
    async fn execute_with_context(self, context: CommandContext) -> Result<()> {
        let resource = resolve_resource(&TemplateRef::parse(self.reference.trim()).resource, "");
        if resource.is_empty() {
            anyhow::bail!("'{}' does not name a resource", self.reference);
        }

        let engine = context.engine();
        engine.load_resource(&resource).await?;
        if self.follow {
            engine.resolve_includes().await;
        }

        let mut includes = Vec::new();
        for key in engine.check_queue().await {
            let resolved = engine.lookup(&key.resource, &key.id).await.is_some();
            includes.push(IncludeReport {
                target: key.to_string(),
                resolved,
            });
        }

        let report = CheckReport {
            sub_templates: engine.sub_templates(&resource).await,
            resource,
            includes,
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => print_text(&report),
        }
        Ok(())
    }
}

fn print_text(report: &CheckReport) {
    println!("{} {}", "✓".green(), report.resource.bold());
    println!();

    println!("{}:", "Sub-templates".cyan().bold());
    if report.sub_templates.is_empty() {
        println!("  {}", "(none)".bright_black());
    }
    for id in &report.sub_templates {
        println!("  {id}");
    }

    if report.includes.is_empty() {
        return;
    }
    println!();
    println!("{}:", "Includes".cyan().bold());
    for include in &report.includes {
        if include.resolved {
            println!("  {}", include.target);
        } else {
            println!("  {} {}", include.target, "(unresolved)".yellow());
        }
    }
}
