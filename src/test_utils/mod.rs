//! Test utilities for Handlebar
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`init_test_logging`] wires `tracing` output into the test harness
//! - [`MemoryLoader`] serves resources from memory, records every fetch and
//!   can hold fetches back to exercise the pending-render queue
//!
//! # Example
//!
//! ```rust,ignore
//! use handlebar::config::EngineConfig;
//! use handlebar::engine::Engine;
//! use handlebar::test_utils::MemoryLoader;
//! use serde_json::json;
//!
//! # async fn example() {
//! let loader = MemoryLoader::new().with_file("page.html", r##"{$: "#p" }hi{$}"##);
//! let engine = Engine::new(loader.clone(), EngineConfig::default());
//! assert_eq!(engine.process_file("page.html#p", json!({})).await.unwrap(), "hi");
//! assert_eq!(loader.fetch_count("page.html"), 1);
//! # }
//! ```

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use tokio::sync::Semaphore;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::loader::Loader;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Permits granted by [`MemoryLoader::release`]; far more than any test fetches
const RELEASED_PERMITS: usize = 1 << 20;

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=handlebar=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// In-memory [`Loader`] for tests.
///
/// Clones share the same files, fetch log and gate, so a test can keep a
/// handle after moving a clone into an engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: Arc<Mutex<HashMap<String, String>>>,
    fetches: Arc<Mutex<Vec<String>>>,
    hanging: Arc<Mutex<HashSet<String>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryLoader {
    /// An empty loader whose fetches complete immediately
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource
    #[must_use]
    pub fn with_file(self, reference: &str, text: &str) -> Self {
        self.insert(reference, text);
        self
    }

    /// Make every fetch wait until [`Self::release`] is called
    #[must_use]
    pub fn held(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Make fetches of `reference` never complete
    #[must_use]
    pub fn hanging_on(self, reference: &str) -> Self {
        lock(&self.hanging).insert(reference.to_string());
        self
    }

    /// Add or replace a resource
    pub fn insert(&self, reference: &str, text: &str) {
        lock(&self.files).insert(reference.to_string(), text.to_string());
    }

    /// Let held fetches (current and future) complete
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(RELEASED_PERMITS);
        }
    }

    /// Every reference fetched so far, in request order
    #[must_use]
    pub fn fetches(&self) -> Vec<String> {
        lock(&self.fetches).clone()
    }

    /// How often `reference` was fetched
    #[must_use]
    pub fn fetch_count(&self, reference: &str) -> usize {
        lock(&self.fetches).iter().filter(|r| *r == reference).count()
    }
}

impl Loader for MemoryLoader {
    async fn get(&self, reference: &str) -> Result<String> {
        lock(&self.fetches).push(reference.to_string());

        if lock(&self.hanging).contains(reference) {
            std::future::pending::<()>().await;
        }

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await?;
        }

        lock(&self.files)
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No resource named '{reference}'"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
