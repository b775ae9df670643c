//! Render the template a state maps to in the manifest.
//!
//! ```bash
//! handlebar state home --json '{"user": "Ada"}'
//! handlebar state home --manifest states/site.json
//! ```
//!
//! As with `render`, resources named by static includes are loaded first
//! unless `--no-includes` is given.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, CommandExecutor, DataArgs, preload_includes, write_output};

/// Arguments of `handlebar state`
#[derive(Args, Debug)]
pub struct StateCommand {
    /// State name declared in the manifest
    state: String,

    /// Manifest reference (defaults to the configured manifest)
    #[arg(short, long)]
    manifest: Option<String>,

    #[command(flatten)]
    data: DataArgs,

    /// Do not load resources referenced by static includes
    #[arg(long)]
    no_includes: bool,
}

impl CommandExecutor for StateCommand {
    async fn execute_with_context(self, context: CommandContext) -> Result<()> {
        let data = self.data.load().await?;
        let engine = context.engine();

        engine.init(self.manifest.as_deref()).await?;
        if !self.no_includes {
            let reference = engine.state_reference(&self.state).await?;
            preload_includes(&engine, &reference).await?;
        }
        let output = engine.process_state(&self.state, data).await?;
        write_output(&output)
    }
}
