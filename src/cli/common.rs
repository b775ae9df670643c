//! Common utilities and traits for CLI commands

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::loader::FileLoader;
use crate::reference::{TemplateRef, resolve_resource};

/// Common trait for CLI command execution pattern
pub trait CommandExecutor: Sized {
    /// Execute the command against a loaded [`CommandContext`]
    fn execute_with_context(
        self,
        context: CommandContext,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Shared state for CLI commands: the effective configuration
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Configuration after applying command-line overrides
    pub config: EngineConfig,
}

impl CommandContext {
    /// Load the configuration and apply a `--root` override.
    ///
    /// # Errors
    /// Returns an error if the configuration file cannot be read or parsed
    pub async fn load(config_path: Option<PathBuf>, root: Option<PathBuf>) -> Result<Self> {
        let mut config = EngineConfig::load_with_optional(config_path).await?;
        if let Some(root) = root {
            config = config.with_root(root);
        }
        tracing::debug!("Serving templates from {}", config.root.display());
        Ok(Self {
            config,
        })
    }

    /// An engine reading files below the configured root
    #[must_use]
    pub fn engine(&self) -> Engine<FileLoader> {
        Engine::new(FileLoader::new(self.config.root.clone()), self.config.clone())
    }
}

/// Render data options shared by `render` and `state`
#[derive(Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// JSON file with the render data (`-` reads stdin)
    #[arg(short, long, value_name = "FILE", conflicts_with = "json")]
    pub data: Option<PathBuf>,

    /// Render data as an inline JSON string
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,
}

impl DataArgs {
    /// Parse the render data; an empty object when none was given.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the text is not JSON
    pub async fn load(&self) -> Result<Value> {
        if let Some(json) = &self.json {
            return serde_json::from_str(json).context("Invalid JSON given with --json");
        }

        let Some(path) = &self.data else {
            return Ok(Value::Object(serde_json::Map::new()));
        };

        let text = if path.as_os_str() == "-" {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read render data from stdin")?;
            text
        } else {
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read render data from {}", path.display()))?
        };

        serde_json::from_str(&text).with_context(|| format!("Render data in {} is not valid JSON", path.display()))
    }
}

/// Load the resource `reference` points into, then every resource its static
/// includes reach.
///
/// Includes that fail to load are skipped and render as nothing.
///
/// # Errors
/// Returns an error if the resource itself cannot be loaded or compiled
pub async fn preload_includes(engine: &Engine<FileLoader>, reference: &str) -> Result<()> {
    let resource = resolve_resource(&TemplateRef::parse(reference.trim()).resource, "");
    if resource.is_empty() {
        return Ok(());
    }
    engine.load_resource(&resource).await?;
    let loaded = engine.resolve_includes().await;
    tracing::debug!("Loaded {} included resource(s) for {}", loaded.len(), resource);
    Ok(())
}

/// Write rendered text to stdout as-is
///
/// # Errors
/// Returns an error if stdout is closed
pub fn write_output(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes()).context("Failed to write output")?;
    stdout.flush().context("Failed to write output")
}
