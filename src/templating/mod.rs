//! Template markup compilation and rendering.
//!
//! This module turns resource text into render trees. The pipeline for one
//! resource runs in this order:
//!
//! 1. [`inherit`]: merge a leading `{$+ "parent#slot" $}` with the parent text
//! 2. [`mask`]: hide raw blocks (`{$% ... %$}`) behind sentinels
//! 3. [`extract`]: strip comments and cut out every declared sub-template
//! 4. [`registry`]: record extracted sub-templates per resource
//! 5. [`compiler`]: compile each uncompiled sub-template into a render tree
//!
//! Rendering a compiled template only needs the registry (for includes) and
//! a JSON scope.
//!
//! # Markup
//!
//! | Tag | Meaning |
//! |---|---|
//! | `{$: "#id" \| decl }...{$}` | sub-template with declarations |
//! | `{$: "#id" $}` | empty sub-template |
//! | `{$* path }...{$}` | loop; the body sees the current record as `item` |
//! | `{$= expr $}` | output a value |
//! | `{$= @"res#id" $}` / `{$= @path $}` | include another sub-template |
//! | `{$% ... %$}` | raw block, output verbatim |
//! | `{$/ ... /$}` | comment |
//! | `{$+ "res#slot" $}` | inherit from a parent slot |
//!
//! Loop records are objects with `key`, `value`, `first`, `last`, `odd` and
//! `even`.
//!
//! # Example
//!
//! ```
//! use handlebar::templating::{Compiler, MaskTable, TemplateRegistry, extract};
//! use serde_json::json;
//!
//! let text = r##"{$: "#hello" | who = data.name }Hello, {$= who $}!{$}"##;
//! let masks = MaskTable::new();
//! let mut queue = Vec::new();
//! let mut registry = TemplateRegistry::new();
//!
//! for sub in extract(text, "hello.html", None)? {
//!     let compiled = Compiler::new("hello.html", &masks, &mut queue).compile(&sub)?;
//!     registry.register("hello.html", &sub.id, compiled);
//! }
//!
//! let template = registry.lookup("hello.html", "#hello").unwrap();
//! assert_eq!(template.render(&json!({"data": {"name": "Ada"}}), &registry), "Hello, Ada!");
//! # Ok::<(), handlebar::core::HandlebarError>(())
//! ```

pub mod compiler;
pub mod expr;
pub mod extract;
pub mod inherit;
pub mod lexer;
pub mod mask;
pub mod registry;

pub use compiler::{CompiledTemplate, Compiler, IncludeTarget, Node};
pub use extract::{SubTemplate, extract, strip_comments};
pub use mask::MaskTable;
pub use registry::TemplateRegistry;
