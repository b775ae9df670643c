//! Command-line interface for Handlebar.
//!
//! The `handlebar` binary renders templates from a directory tree:
//!
//! - `render <ref>` - compile a resource and render one of its sub-templates
//! - `state <name>` - load the manifest and render the template mapped to a state
//! - `raw <ref>` - print a resource's text unprocessed
//! - `check <ref>` - compile a resource and report its sub-templates and includes
//!
//! # Global options
//!
//! - `--verbose` / `--quiet` control log output on stderr (`RUST_LOG` is
//!   honored when neither is given)
//! - `--config <path>` selects the configuration file
//! - `--root <dir>` overrides the directory references are loaded from
//!
//! Rendered output goes to stdout, so it can be piped or redirected.

mod check;
pub mod common;
mod raw;
mod render;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use common::{CommandContext, CommandExecutor};

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log filter directive; `None` leaves logging off unless `RUST_LOG` is set
    pub log_level: Option<String>,
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
    /// Loader root override
    pub root: Option<PathBuf>,
}

impl CliConfig {
    /// Install the tracing subscriber writing to stderr.
    ///
    /// Safe to call more than once; only the first call installs anything.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None if std::env::var("RUST_LOG").is_ok() => EnvFilter::from_default_env(),
            None => return,
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Top-level command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "handlebar",
    about = "Handlebar - compile and render template markup",
    version,
    long_about = "Handlebar compiles template resources containing sub-template declarations, loops, \
                  includes, raw blocks and inheritance, and renders them with JSON data."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "HANDLEBAR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory template references are loaded from
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a sub-template of a resource (`path/to/file.html#id`)
    Render(render::RenderCommand),
    /// Render the template the manifest maps a state to
    State(state::StateCommand),
    /// Print a resource without processing it
    Raw(raw::RawCommand),
    /// Compile a resource and list its sub-templates and include targets
    Check(check::CheckCommand),
}

impl Cli {
    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Returns any configuration, loading, compilation or output error.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Map the global flags to a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("handlebar=debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
            root: self.root.clone(),
        }
    }

    /// Run the selected command with an explicit [`CliConfig`].
    ///
    /// # Errors
    ///
    /// Returns any configuration, loading, compilation or output error.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let context = CommandContext::load(config.config_path, config.root).await?;

        match self.command {
            Commands::Render(cmd) => cmd.execute_with_context(context).await,
            Commands::State(cmd) => cmd.execute_with_context(context).await,
            Commands::Raw(cmd) => cmd.execute_with_context(context).await,
            Commands::Check(cmd) => cmd.execute_with_context(context).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_levels() {
        let cli = Cli::parse_from(["handlebar", "--verbose", "raw", "a.html"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("handlebar=debug"));

        let cli = Cli::parse_from(["handlebar", "raw", "a.html", "--quiet", "--root", "site"]);
        let config = cli.build_config();
        assert_eq!(config.log_level.as_deref(), Some("error"));
        assert_eq!(config.root, Some(PathBuf::from("site")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["handlebar", "-v", "-q", "raw", "a.html"]).is_err());
    }
}
