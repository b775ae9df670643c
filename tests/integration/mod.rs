//! Integration test suite for Handlebar
//!
//! End-to-end tests driving the public API through an in-memory loader and the
//! `handlebar` binary against temporary directories.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **engine**: compiling and rendering resources, caching, includes, loader failures
//! - **inheritance**: extends chains and slot merging
//! - **pending_queue**: state renders issued while the manifest loads
//! - **cli**: the `handlebar` binary

mod cli;
mod engine;
mod inheritance;
mod pending_queue;

use handlebar::config::EngineConfig;
use handlebar::engine::Engine;
use handlebar::test_utils::{MemoryLoader, init_test_logging};

/// An engine over `loader` with default settings
pub fn engine_with(loader: &MemoryLoader) -> Engine<MemoryLoader> {
    init_test_logging(None);
    Engine::new(loader.clone(), EngineConfig::default())
}
