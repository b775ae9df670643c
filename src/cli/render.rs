//! Render a sub-template of a resource.
//!
//! ```bash
//! handlebar render views/page.html#main --json '{"title": "Home"}'
//! handlebar render views/page.html#main --data page.json > page.html
//! ```
//!
//! Resources named by static includes (`{$= @"other.html#id" $}`) are loaded
//! before rendering unless `--no-includes` is given; unresolved includes
//! render as nothing.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, CommandExecutor, DataArgs, preload_includes, write_output};

/// Arguments of `handlebar render`
#[derive(Args, Debug)]
pub struct RenderCommand {
    /// Template reference, `path/to/resource#id`
    reference: String,

    #[command(flatten)]
    data: DataArgs,

    /// Do not load resources referenced by static includes
    #[arg(long)]
    no_includes: bool,
}

impl CommandExecutor for RenderCommand {
    async fn execute_with_context(self, context: CommandContext) -> Result<()> {
        let data = self.data.load().await?;
        let engine = context.engine();

        if !self.no_includes {
            preload_includes(&engine, &self.reference).await?;
        }

        let output = engine.process_file(&self.reference, data).await?;
        write_output(&output)
    }
}
