//! Resource loading.
//!
//! The engine never touches the file system directly; every resource and
//! manifest fetch goes through a [`Loader`]. [`FileLoader`] serves references
//! from a directory. Tests use the in-memory loader from `test_utils`.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Component, Path, PathBuf};

/// Source of resource text.
///
/// References are canonical resource paths (`views/page.html`), never
/// carrying a `#fragment`.
pub trait Loader: Send + Sync + 'static {
    /// Fetch the full text of `reference`.
    fn get(&self, reference: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Loads resources from files below a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Create a loader serving files below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// The directory references are resolved against
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference to a path below the root.
    ///
    /// A leading `/` is treated as root-relative. References containing `..`
    /// segments are rejected.
    ///
    /// # Errors
    ///
    /// Fails when the reference is empty or would escape the root.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference.trim_start_matches('/'));
        let mut path = self.root.clone();
        let mut segments = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    path.push(segment);
                    segments += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    anyhow::bail!("Reference '{reference}' escapes the loader root");
                }
            }
        }

        if segments == 0 {
            anyhow::bail!("Reference '{reference}' does not name a file");
        }
        Ok(path)
    }
}

impl Loader for FileLoader {
    async fn get(&self, reference: &str) -> Result<String> {
        let path = self.resolve(reference)?;
        tracing::debug!("Reading {} from {}", reference, path.display());
        tokio::fs::read_to_string(&path).await.with_context(|| format!("Failed to read {}", path.display()))
    }
}
