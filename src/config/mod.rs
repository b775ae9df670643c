//! Configuration management for Handlebar.
//!
//! Engine settings come from a TOML file. The file is looked up in this order,
//! first match wins:
//!
//! 1. The path given with `--config`
//! 2. The path in the `HANDLEBAR_CONFIG` environment variable
//! 3. `handlebar.toml` in the current directory
//! 4. `~/.handlebar/config.toml` (`%LOCALAPPDATA%\handlebar\config.toml` on Windows)
//!
//! When none exists the built-in defaults apply. See [`EngineConfig`] for the
//! keys.

mod settings;

pub use settings::EngineConfig;
