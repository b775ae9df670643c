//! Global constants used throughout the Handlebar codebase.
//!
//! This module contains markup markers, timeouts and recursion limits that are
//! used across multiple modules.

use std::time::Duration;

/// Manifest reference used when `init` is called without one.
pub const DEFAULT_MANIFEST: &str = "templates.json";

/// Project-local configuration file name.
pub const CONFIG_FILE_NAME: &str = "handlebar.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "HANDLEBAR_CONFIG";

/// Default timeout for a single loader request (30 seconds).
///
/// A load that never completes surfaces as a timeout error instead of leaving
/// the dependent render pending forever.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum nesting of include tags evaluated during one render.
///
/// Includes beyond this depth render as empty output, which stops a
/// sub-template that includes itself.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Maximum number of extends declarations followed for a single resource.
pub const MAX_EXTENDS_DEPTH: usize = 16;

/// Most `null` slots an indexed assignment may add past the end of an array.
///
/// Assignments further out than this write nothing.
pub const MAX_ARRAY_GROWTH: usize = 1024;

/// Exclusive upper bound of the random payload placed inside raw-block sentinels.
pub const MASK_PAYLOAD_RANGE: u32 = 100_000_000;

/// Start of every tag.
pub const TAG_OPEN: &str = "{$";
/// Block close, balancing declarations and loops.
pub const BLOCK_CLOSE: &str = "{$}";
/// Raw block start.
pub const RAW_OPEN: &str = "{$%";
/// Raw block end.
pub const RAW_CLOSE: &str = "%$}";
/// Comment block start.
pub const COMMENT_OPEN: &str = "{$/";
/// Comment block end.
pub const COMMENT_CLOSE: &str = "/$}";
