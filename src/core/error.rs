//! Error handling for Handlebar
//!
//! This module provides the error types and user-facing error reporting for the
//! template engine. The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can react to specific failures
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Markup structure**: [`HandlebarError::StructuralImbalance`],
//!   [`HandlebarError::UnterminatedTag`], [`HandlebarError::InvalidDeclaration`]
//! - **Expressions**: [`HandlebarError::InvalidExpression`]
//! - **Loading**: [`HandlebarError::LoadFailure`], [`HandlebarError::LoadTimeout`],
//!   [`HandlebarError::InvalidReference`]
//! - **Manifest**: [`HandlebarError::MalformedManifest`], [`HandlebarError::ManifestNotLoaded`],
//!   [`HandlebarError::AlreadyInitialized`], [`HandlebarError::UnknownState`]
//! - **Inheritance**: [`HandlebarError::MissingExtendsSlot`], [`HandlebarError::ExtendsDepthExceeded`]
//!
//! Unresolved references (an expression or include that points at nothing) are
//! not errors: they render as empty output and are only traced.
//!
//! # Examples
//!
//! ```rust,no_run
//! use handlebar::core::{HandlebarError, user_friendly_error};
//!
//! let error = HandlebarError::ManifestNotLoaded;
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for Handlebar operations
///
/// Every variant carries owned string payloads so the error can be cloned and
/// delivered to each render request waiting on the same manifest load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlebarError {
    /// A sub-template's open markers never balance against `{$}` closes
    ///
    /// Extraction fails fast instead of scanning to the end of the resource
    /// and silently truncating the body.
    #[error("Unbalanced block markers in sub-template '{id}' of '{resource}' ({unclosed} block(s) left open)")]
    StructuralImbalance {
        /// Resource the sub-template belongs to
        resource: String,
        /// Identifier of the sub-template whose body never closed
        id: String,
        /// Nesting depth still open when the text ran out
        unclosed: usize,
    },

    /// A tag was opened but its terminator was never found
    #[error("Unterminated '{marker}' tag at byte {offset} in '{resource}'")]
    UnterminatedTag {
        /// Resource being lexed
        resource: String,
        /// The opening marker, e.g. `{$=`
        marker: String,
        /// Byte offset of the opening marker
        offset: usize,
    },

    /// A declaration tag without a quoted `#id`
    #[error("Invalid sub-template declaration at byte {offset} in '{resource}': {reason}")]
    InvalidDeclaration {
        /// Resource being lexed
        resource: String,
        /// Byte offset of the declaration tag
        offset: usize,
        /// What is wrong with the declaration
        reason: String,
    },

    /// An inline declaration or tag expression could not be parsed
    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression {
        /// The expression text as written (after qualification)
        expression: String,
        /// Parser diagnostic
        reason: String,
    },

    /// A resource or manifest fetch failed
    #[error("Failed to load '{reference}': {reason}")]
    LoadFailure {
        /// The reference handed to the loader
        reference: String,
        /// Loader diagnostic
        reason: String,
    },

    /// A resource or manifest fetch did not complete in time
    #[error("Loading '{reference}' timed out after {timeout_ms}ms")]
    LoadTimeout {
        /// The reference handed to the loader
        reference: String,
        /// The configured timeout
        timeout_ms: u64,
    },

    /// The manifest is not a JSON document with a `templates` map
    #[error("Invalid manifest '{reference}': {reason}")]
    MalformedManifest {
        /// Manifest reference
        reference: String,
        /// Parse diagnostic
        reason: String,
    },

    /// A state render was requested before `init` was called
    #[error("No manifest has been loaded; call init first")]
    ManifestNotLoaded,

    /// `init` was called on an engine whose manifest gate already opened
    #[error("The engine manifest has already been initialized")]
    AlreadyInitialized,

    /// The manifest has no entry for the requested state
    #[error("State '{state}' is not defined in the manifest")]
    UnknownState {
        /// Requested state name
        state: String,
        /// Similar state names found in the manifest
        suggestions: Vec<String>,
    },

    /// A template reference without a resource part
    #[error("Invalid template reference '{reference}'")]
    InvalidReference {
        /// The reference as given
        reference: String,
    },

    /// The parent named by an extends declaration lacks the requested slot
    #[error("Parent '{parent}' has no sub-template '{slot}' to extend")]
    MissingExtendsSlot {
        /// Parent resource
        parent: String,
        /// Requested slot identifier
        slot: String,
    },

    /// Extends chains nested deeper than the engine allows (usually a cycle)
    #[error("Extends chain for '{resource}' exceeded {depth} levels")]
    ExtendsDepthExceeded {
        /// Resource whose inheritance was being resolved
        resource: String,
        /// The configured limit
        depth: usize,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// Error context wrapper that provides user-friendly error information
///
/// Wraps a [`HandlebarError`] with an optional suggestion and details, displayed
/// with terminal colors by the CLI.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: HandlebarError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details
    #[must_use]
    pub const fn new(error: HandlebarError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`HandlebarError`] anywhere in the chain, [`std::io::Error`] and
/// [`toml::de::Error`]; everything else keeps its full cause chain in the message.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(hb_error) = cause.downcast_ref::<HandlebarError>() {
            return create_error_context(hb_error.clone());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::NotFound {
            return ErrorContext::new(HandlebarError::Other {
                message: error.to_string(),
            })
            .with_suggestion("Check that the file exists and the path is correct")
            .with_details("Resource references are resolved against the configured root directory");
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(HandlebarError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in your handlebar.toml file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(HandlebarError::Other {
        message,
    })
}

/// Map each [`HandlebarError`] variant to a context with tailored suggestions
fn create_error_context(error: HandlebarError) -> ErrorContext {
    match &error {
        HandlebarError::StructuralImbalance { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Close every '{$: \"#id\" }' declaration and every '{$* name }' loop with a matching '{$}'")
            .with_details("Expression and self-closing tags end with '$}'; block tags end with '}' and need a '{$}' close"),

        HandlebarError::UnterminatedTag { marker, .. } => {
            let expected = match marker.as_str() {
                "{$%" => "%$}",
                "{$/" => "/$}",
                _ => "$} or }",
            };
            ErrorContext::new(error.clone())
                .with_suggestion(format!("Terminate the '{marker}' tag with '{expected}'"))
        }

        HandlebarError::InvalidDeclaration { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Declare sub-templates as {$: \"#name\" } ... {$} with a quoted identifier starting with '#'"),

        HandlebarError::InvalidExpression { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Declarations look like 'name = data.value ? \"yes\" : \"no\"'; strings need matching quotes")
            .with_details("Identifiers starting with a lowercase letter resolve against the data context"),

        HandlebarError::LoadFailure { reference, .. } | HandlebarError::LoadTimeout { reference, .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Verify that '{reference}' exists under the configured root directory (see --root)"
                ))
        }

        HandlebarError::MalformedManifest { .. } => ErrorContext::new(error.clone())
            .with_suggestion("The manifest must be JSON of the form {\"templates\": {\"state\": \"file.html#id\"}}"),

        HandlebarError::ManifestNotLoaded => ErrorContext::new(error.clone())
            .with_suggestion("Call init (or pass --manifest) before rendering states"),

        HandlebarError::UnknownState { suggestions, .. } if !suggestions.is_empty() => {
            ErrorContext::new(error.clone())
                .with_suggestion(format!("Did you mean: {}", suggestions.join(", ")))
        }

        HandlebarError::InvalidReference { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Template references have the form 'path/to/file.html#id'"),

        HandlebarError::MissingExtendsSlot { parent, slot } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Declare {{$: \"{slot}\" }} ... {{$}} in '{parent}' or fix the extends reference")),

        HandlebarError::ExtendsDepthExceeded { .. } => ErrorContext::new(error.clone())
            .with_details("A template probably extends itself through a chain of parents"),

        _ => ErrorContext::new(error),
    }
}

/// Result alias used by the templating core
pub type Result<T, E = HandlebarError> = std::result::Result<T, E>;
