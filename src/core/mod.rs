//! Core types shared across Handlebar: the error type and user-facing error reporting.
//!
//! # Error Handling Strategy
//!
//! Library code returns [`HandlebarError`] (through the [`Result`] alias) so callers
//! can match on specific failures. Application code (the CLI) works with
//! [`anyhow::Error`] and turns it into an [`ErrorContext`] with
//! [`user_friendly_error`] right before printing.

pub mod error;

pub use error::{ErrorContext, HandlebarError, Result, user_friendly_error};
