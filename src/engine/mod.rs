//! The template engine: loading, compiling and rendering resources.
//!
//! An [`Engine`] owns everything one application needs at run time:
//!
//! - the [`Loader`] resources and the manifest are fetched through
//! - a [`TemplateRegistry`] of compiled sub-templates (compile-once per key)
//! - the [`MaskTable`] of raw blocks seen so far
//! - the check queue of static include targets met while compiling
//! - the manifest and the [`PendingQueue`] holding state renders back while
//!   the manifest loads
//!
//! # Rendering states before the manifest arrives
//!
//! [`Engine::process_state`] may be called while [`Engine::init`] is still
//! fetching the manifest. Such calls are parked in arrival order and replayed
//! one after another once the manifest is in; if loading fails, every parked
//! call receives the same error.
//!
//! ```rust,no_run
//! use handlebar::config::EngineConfig;
//! use handlebar::engine::Engine;
//! use handlebar::loader::FileLoader;
//! use serde_json::json;
//!
//! # async fn example() -> handlebar::core::Result<()> {
//! let engine = Engine::new(FileLoader::new("site"), EngineConfig::default());
//! let (ready, page) = tokio::join!(
//!     engine.init(None),
//!     engine.process_state("home", json!({"user": "Ada"})),
//! );
//! ready?;
//! println!("{}", page?);
//! # Ok(())
//! # }
//! ```

pub mod manifest;
pub mod queue;

pub use manifest::Manifest;
pub use queue::{Admission, PendingQueue};

use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, oneshot};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::constants::MAX_EXTENDS_DEPTH;
use crate::core::{HandlebarError, Result};
use crate::loader::Loader;
use crate::reference::{TemplateKey, TemplateRef, canonicalize, resolve_resource};
use crate::templating::compiler::{CompiledTemplate, Compiler};
use crate::templating::extract::{extract, strip_comments};
use crate::templating::inherit;
use crate::templating::mask::MaskTable;
use crate::templating::registry::TemplateRegistry;

/// A state render parked until the manifest is available.
#[derive(Debug)]
pub struct PendingRender {
    /// Requested state name
    pub state: String,
    /// Render data
    pub data: Value,
    /// Where the render result goes
    pub reply: oneshot::Sender<Result<String>>,
}

/// Mutable per-engine tables, guarded together.
#[derive(Debug)]
struct Workspace {
    registry: TemplateRegistry,
    masks: MaskTable,
    check_queue: Vec<TemplateKey>,
    loaded: HashSet<String>,
}

impl Workspace {
    fn new(config: &EngineConfig) -> Self {
        Self {
            registry: TemplateRegistry::with_include_limit(config.max_include_depth),
            masks: MaskTable::new(),
            check_queue: Vec::new(),
            loaded: HashSet::new(),
        }
    }

    /// Mask, extract and compile `text` as the contents of `resource`.
    fn ingest(&mut self, text: &str, resource: &str) -> Result<()> {
        let masked = self.masks.mask_all(text);
        let stripped = strip_comments(&masked);

        let mut order: Vec<String> = Vec::new();
        for sub in extract(&stripped, resource, None)? {
            if !order.contains(&sub.id) {
                order.push(sub.id.clone());
            }
            self.registry.insert_extracted(resource, sub);
        }

        // Declaration order, so the check queue follows the text.
        let mut pending = self.registry.uncompiled(resource);
        pending.sort_by_key(|sub| order.iter().position(|id| *id == sub.id));
        for sub in pending {
            let compiled = Compiler::new(resource, &self.masks, &mut self.check_queue).compile(&sub)?;
            self.registry.register(resource, &sub.id, compiled);
        }

        self.loaded.insert(resource.to_string());
        Ok(())
    }

    fn render(&self, resource: &str, id: &str, data: Value) -> String {
        match self.registry.lookup(resource, id) {
            Some(template) => template.render(&json!({ "data": data }), &self.registry),
            None => {
                debug!("No sub-template {}{}, rendering nothing", resource, id);
                String::new()
            }
        }
    }
}

/// Template engine bound to one loader.
pub struct Engine<L: Loader> {
    loader: Arc<L>,
    config: EngineConfig,
    workspace: Mutex<Workspace>,
    manifest: RwLock<Option<Manifest>>,
    gate: Mutex<PendingQueue<PendingRender>>,
}

impl<L: Loader> Engine<L> {
    /// Create an engine fetching through `loader`
    pub fn new(loader: L, config: EngineConfig) -> Self {
        Self::with_shared_loader(Arc::new(loader), config)
    }

    fn with_shared_loader(loader: Arc<L>, config: EngineConfig) -> Self {
        let workspace = Workspace::new(&config);
        Self {
            loader,
            config,
            workspace: Mutex::new(workspace),
            manifest: RwLock::new(None),
            gate: Mutex::new(PendingQueue::new()),
        }
    }

    /// A new engine sharing this engine's loader and configuration, with empty
    /// tables and no manifest.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self::with_shared_loader(Arc::clone(&self.loader), self.config.clone())
    }

    /// The engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the state manifest and release parked state renders.
    ///
    /// `manifest_ref` defaults to the configured manifest.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::AlreadyInitialized`] on a second call, and the
    /// load or parse error when the manifest cannot be read. Parked renders
    /// receive the same error.
    pub async fn init(&self, manifest_ref: Option<&str>) -> Result<()> {
        let reference = manifest_ref.unwrap_or(&self.config.manifest).to_string();
        self.gate.lock().await.begin_loading()?;
        info!("Loading manifest {}", reference);

        let outcome = match self.fetch(&reference).await {
            Ok(text) => Manifest::parse(&reference, &text),
            Err(e) => Err(e),
        };
        let outcome = match outcome {
            Ok(manifest) => {
                info!("Manifest {} declares {} state(s)", reference, manifest.len());
                *self.manifest.write().await = Some(manifest);
                Ok(())
            }
            Err(e) => {
                warn!("Manifest {} failed to load: {}", reference, e);
                Err(e)
            }
        };

        let parked = self.gate.lock().await.drain();
        if !parked.is_empty() {
            debug!("Replaying {} parked state render(s)", parked.len());
        }
        for request in parked {
            let result = match &outcome {
                Ok(()) => self.render_state(&request.state, request.data).await,
                Err(e) => Err(e.clone()),
            };
            if request.reply.send(result).is_err() {
                debug!("Caller waiting on state '{}' went away", request.state);
            }
        }

        outcome
    }

    /// Compile `content` and render its sub-template `id`.
    ///
    /// `content` is treated as the text of `resource` (default: an anonymous
    /// resource). When `id` is already compiled for that resource, `content`
    /// is not looked at again and nothing is fetched. Sub-templates already
    /// compiled for the resource are kept. An `id` that is not declared
    /// renders as an empty string.
    ///
    /// # Errors
    ///
    /// Propagates markup, expression and inheritance errors.
    pub async fn process_template(
        &self,
        content: &str,
        id: &str,
        data: Value,
        resource: Option<&str>,
    ) -> Result<String> {
        let resource = resource.map(|r| resolve_resource(r, "")).unwrap_or_default();
        {
            let workspace = self.workspace.lock().await;
            if workspace.registry.lookup(&resource, id).is_some() {
                debug!("{}{} already compiled", resource, id);
                return Ok(workspace.render(&resource, id, data));
            }
        }
        let text = self.resolve_extends(content.to_string(), &resource).await?;

        let mut workspace = self.workspace.lock().await;
        workspace.ingest(&text, &resource)?;
        Ok(workspace.render(&resource, id, data))
    }

    /// Load (once) and render `reference` (`resource#id`).
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::InvalidReference`] when `reference` has no
    /// resource part, plus any load or compile error.
    pub async fn process_file(&self, reference: &str, data: Value) -> Result<String> {
        let key = Self::resource_key(reference)?;
        self.load_resource(&key.resource).await?;
        Ok(self.workspace.lock().await.render(&key.resource, &key.id, data))
    }

    /// Render the template the manifest maps `state` to.
    ///
    /// While the manifest is loading the render is parked and runs after the
    /// load completes.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::ManifestNotLoaded`] before `init`,
    /// [`HandlebarError::UnknownState`] for a state the manifest lacks, and the
    /// manifest error when loading failed.
    pub async fn process_state(&self, state: &str, data: Value) -> Result<String> {
        let (reply, response) = oneshot::channel();
        let request = PendingRender {
            state: state.to_string(),
            data,
            reply,
        };

        let admission = self.gate.lock().await.admit(request);
        match admission {
            Admission::Deferred => {
                debug!("Parking render of state '{}' until the manifest loads", state);
                response.await.map_err(|_| HandlebarError::Other {
                    message: format!("render of state '{state}' was dropped before the manifest loaded"),
                })?
            }
            Admission::Ready(request) => self.render_state(&request.state, request.data).await,
            Admission::Uninitialized(_) => Err(HandlebarError::ManifestNotLoaded),
        }
    }

    /// Fetch a resource's text without compiling or caching it.
    ///
    /// Any `#fragment` on `reference` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::InvalidReference`], [`HandlebarError::LoadFailure`]
    /// or [`HandlebarError::LoadTimeout`].
    pub async fn passthru_file(&self, reference: &str) -> Result<String> {
        let key = Self::resource_key(reference)?;
        self.fetch(&key.resource).await
    }

    /// The compiled sub-template `resource` + `id`, if registered
    pub async fn lookup(&self, resource: &str, id: &str) -> Option<Arc<CompiledTemplate>> {
        self.workspace.lock().await.registry.lookup(resource, id)
    }

    /// Sub-template ids registered for `resource`, sorted
    pub async fn sub_templates(&self, resource: &str) -> Vec<String> {
        self.workspace.lock().await.registry.ids(resource)
    }

    /// Static include targets met while compiling.
    ///
    /// Resources are listed in the order they were compiled; within one
    /// resource, sub-templates are compiled in declaration order.
    pub async fn check_queue(&self) -> Vec<TemplateKey> {
        self.workspace.lock().await.check_queue.clone()
    }

    /// Load every resource named by the check queue that is not loaded yet,
    /// following newly discovered includes.
    ///
    /// Resources that fail to load are logged and skipped; their includes
    /// render as nothing. Returns the resources that were loaded.
    pub async fn resolve_includes(&self) -> Vec<String> {
        let mut attempted: HashSet<String> = HashSet::new();
        let mut loaded = Vec::new();

        loop {
            let pending: Vec<String> = {
                let workspace = self.workspace.lock().await;
                let mut pending: Vec<String> = workspace
                    .check_queue
                    .iter()
                    .map(|key| key.resource.clone())
                    .filter(|resource| !resource.is_empty())
                    .filter(|resource| !workspace.loaded.contains(resource) && !attempted.contains(resource))
                    .collect();
                pending.dedup();
                pending
            };
            if pending.is_empty() {
                return loaded;
            }

            for resource in pending {
                if !attempted.insert(resource.clone()) {
                    continue;
                }
                match self.load_resource(&resource).await {
                    Ok(()) => loaded.push(resource),
                    Err(e) => warn!("Could not load included resource {}: {}", resource, e),
                }
            }
        }
    }

    /// Fetch, merge and compile `resource` unless it was loaded before.
    ///
    /// # Errors
    ///
    /// Propagates load, markup and inheritance errors.
    pub async fn load_resource(&self, resource: &str) -> Result<()> {
        if self.workspace.lock().await.loaded.contains(resource) {
            debug!("{} already loaded", resource);
            return Ok(());
        }

        let text = self.fetch(resource).await?;
        let text = self.resolve_extends(text, resource).await?;
        self.workspace.lock().await.ingest(&text, resource)
    }

    /// The template reference the manifest maps `state` to.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::ManifestNotLoaded`] until `init` has
    /// succeeded and [`HandlebarError::UnknownState`] for an unmapped state.
    pub async fn state_reference(&self, state: &str) -> Result<String> {
        let manifest = self.manifest.read().await;
        let manifest = manifest.as_ref().ok_or(HandlebarError::ManifestNotLoaded)?;
        Ok(manifest.reference_for(state)?.to_string())
    }

    async fn render_state(&self, state: &str, data: Value) -> Result<String> {
        let reference = self.state_reference(state).await?;
        debug!("State '{}' renders {}", state, reference);
        self.process_file(&reference, data).await
    }

    /// Follow the leading extends tags of `text` until none is left.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::ExtendsDepthExceeded`] for chains longer than
    /// the configured limit, plus load and slot errors.
    pub async fn resolve_extends(&self, text: String, resource: &str) -> Result<String> {
        let mut text = text;
        let mut depth = 0usize;

        while let Some(ext) = inherit::parse_extends(&text)? {
            depth += 1;
            if depth > MAX_EXTENDS_DEPTH {
                return Err(HandlebarError::ExtendsDepthExceeded {
                    resource: resource.to_string(),
                    depth: MAX_EXTENDS_DEPTH,
                });
            }

            let parent = canonicalize(&ext.reference, resource);
            if parent.resource.is_empty() {
                return Err(HandlebarError::InvalidReference {
                    reference: ext.reference,
                });
            }
            debug!("{} extends {}", if resource.is_empty() { "<inline>" } else { resource }, parent);

            let parent_text = self.fetch(&parent.resource).await?;
            let parent_part = inherit::parent_part(&parent_text, &parent)?;
            text = inherit::merge(&parent_part, ext.remainder);
        }

        Ok(text)
    }

    /// Fetch through the loader, bounded by the configured timeout.
    async fn fetch(&self, reference: &str) -> Result<String> {
        let timeout = self.config.load_timeout();
        debug!("Fetching {}", reference);

        match tokio::time::timeout(timeout, self.loader.get(reference)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(HandlebarError::LoadFailure {
                reference: reference.to_string(),
                reason: format!("{e:#}"),
            }),
            Err(_) => Err(HandlebarError::LoadTimeout {
                reference: reference.to_string(),
                timeout_ms: self.config.load_timeout_ms,
            }),
        }
    }

    fn resource_key(reference: &str) -> Result<TemplateKey> {
        let parsed = TemplateRef::parse(reference.trim());
        let resource = resolve_resource(&parsed.resource, "");
        if resource.is_empty() {
            return Err(HandlebarError::InvalidReference {
                reference: reference.to_string(),
            });
        }
        Ok(TemplateKey::new(resource, parsed.fragment))
    }
}
