//! Print a resource without processing it.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, CommandExecutor, write_output};

/// Arguments of `handlebar raw`
#[derive(Args, Debug)]
pub struct RawCommand {
    /// Resource reference; a `#fragment` is ignored
    reference: String,
}

impl CommandExecutor for RawCommand {
    async fn execute_with_context(self, context: CommandContext) -> Result<()> {
        let text = context.engine().passthru_file(&self.reference).await?;
        write_output(&text)
    }
}
