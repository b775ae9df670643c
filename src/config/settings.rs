//! Engine settings loaded from `handlebar.toml`.
//!
//! ```toml
//! # Manifest fetched by `init` when no reference is given
//! manifest = "templates.json"
//!
//! # Directory the file loader serves references from.
//! # Relative paths are resolved against the config file's directory.
//! root = "site"
//!
//! # Per-request loader timeout
//! load_timeout_ms = 30000
//!
//! # Nested include limit while rendering
//! max_include_depth = 32
//! ```
//!
//! Every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_LOAD_TIMEOUT, DEFAULT_MANIFEST, MAX_INCLUDE_DEPTH,
};

fn default_manifest() -> String {
    DEFAULT_MANIFEST.to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

#[allow(clippy::cast_possible_truncation)]
const fn default_load_timeout_ms() -> u64 {
    DEFAULT_LOAD_TIMEOUT.as_millis() as u64
}

const fn default_max_include_depth() -> usize {
    MAX_INCLUDE_DEPTH
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Manifest reference used by `init` without an explicit reference
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Base directory of the file loader
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Timeout for a single loader request, in milliseconds
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Maximum include nesting while rendering
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            root: default_root(),
            load_timeout_ms: default_load_timeout_ms(),
            max_include_depth: default_max_include_depth(),
        }
    }
}

impl EngineConfig {
    /// Load the configuration found by [`Self::locate`], or defaults when no
    /// file exists.
    ///
    /// # Errors
    ///
    /// Fails when an explicitly named file (argument or environment) is
    /// missing, or when the chosen file cannot be read or parsed.
    pub async fn load_with_optional(explicit: Option<PathBuf>) -> Result<Self> {
        let env_path = std::env::var_os(crate::constants::CONFIG_ENV_VAR);
        let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
        let home_path = Self::default_path().ok();

        match Self::locate(explicit, env_path, &cwd, home_path.as_deref()) {
            Some(path) => Self::load_from(&path).await,
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Read and parse a configuration file.
    ///
    /// A relative `root` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid configuration TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        if config.root.is_relative() {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                config.root = dir.join(&config.root);
            }
        }

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Pick the configuration file to load.
    ///
    /// Order: `explicit`, then the `HANDLEBAR_CONFIG` value, then
    /// `handlebar.toml` in `cwd`, then the user file. The first two are
    /// returned whether or not they exist; the last two only when present.
    #[must_use]
    pub fn locate(
        explicit: Option<PathBuf>,
        env_path: Option<OsString>,
        cwd: &Path,
        home_path: Option<&Path>,
    ) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path);
        }
        if let Some(path) = env_path.filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }

        let project = cwd.join(CONFIG_FILE_NAME);
        if project.is_file() {
            return Some(project);
        }

        home_path.filter(|p| p.is_file()).map(Path::to_path_buf)
    }

    /// The user configuration file (`~/.handlebar/config.toml`).
    ///
    /// # Errors
    ///
    /// Fails when the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("handlebar")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".handlebar")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// The loader timeout as a [`Duration`]
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Replace the loader root
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}
