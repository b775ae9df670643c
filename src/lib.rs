//! Handlebar - a micro-compiler for embedded template markup
//!
//! Handlebar compiles resources (usually HTML files) that embed template
//! directives between `{$` and `}` / `$}` markers, and renders the compiled
//! sub-templates against JSON data.
//!
//! # Markup at a glance
//!
//! ```text
//! {$: "#page" | title = data.title }        declare sub-template #page, bind `title`
//!   <h1>{$= title $}</h1>                   output an expression (HTML is not escaped)
//!   {$* data.items }                        loop; `item` holds key/value/first/last/odd/even
//!     <li>{$= item.value $}</li>
//!   {$}
//!   {$= @"shared/nav.html#menu" $}          include another sub-template
//!   {$% <b>kept verbatim</b> %$}            raw block, never interpreted
//!   {$/ anything here is dropped /$}        comment
//! {$}
//! ```
//!
//! A resource may start with `{$+ "base.html#slot" $}` to extend a parent
//! resource; see [`templating::inherit`].
//!
//! # Core Modules
//!
//! - [`templating`] - masking, extraction, expression compilation, compiled
//!   templates and the registry
//! - [`engine`] - the [`engine::Engine`]: loading, caching, state manifests and
//!   the render queue used while the manifest loads
//! - [`loader`] - where resource text comes from ([`loader::FileLoader`])
//! - [`reference`] - `resource#id` references and their canonical form
//! - [`config`] - `handlebar.toml` settings
//! - [`core`] - error types and user-facing error reporting
//! - [`cli`] - the `handlebar` command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use handlebar::config::EngineConfig;
//! use handlebar::engine::Engine;
//! use handlebar::loader::FileLoader;
//! use serde_json::json;
//!
//! # async fn example() -> handlebar::core::Result<()> {
//! let engine = Engine::new(FileLoader::new("site"), EngineConfig::default());
//! let html = engine.process_file("views/page.html#page", json!({"title": "Home"})).await?;
//! println!("{html}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod engine;
pub mod loader;
pub mod reference;
pub mod templating;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
