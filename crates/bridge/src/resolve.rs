use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use store::prelude::{NodeId, Repository};

use crate::error::BridgeError;

/// The single base all requests must name. Other bases are a
/// deployment error and fail fast.
pub const SUPPORTED_BASE: &str = "repo://main/root";

/// Resolves `(base, path)` pairs to node identifiers. The root handle
/// is fetched once and cached for the life of the process; a restored
/// or rebuilt backend store makes it stale, which is accepted.
pub struct PathResolver {
    repo: Arc<dyn Repository>,
    base: String,
    root: OnceCell<NodeId>,
}

impl PathResolver {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self::with_base(repo, SUPPORTED_BASE)
    }

    pub fn with_base(repo: Arc<dyn Repository>, base: impl Into<String>) -> Self {
        Self {
            repo,
            base: base.into(),
            root: OnceCell::new(),
        }
    }

    pub fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub async fn root(&self) -> Result<NodeId, BridgeError> {
        let root = self
            .root
            .get_or_try_init(|| async {
                let root = self.repo.root().await?;
                debug!(%root, "cached root handle");
                Ok::<_, BridgeError>(root)
            })
            .await?;
        Ok(*root)
    }

    pub fn check_base(&self, base: &str) -> Result<(), BridgeError> {
        if base == self.base {
            Ok(())
        } else {
            Err(BridgeError::UnsupportedBase(base.to_string()))
        }
    }

    /// Splits on `/`, discarding empty segments. `""`, `"/"` and
    /// `"//"` all name the base itself.
    pub fn split_segments(path: &str) -> Vec<&str> {
        path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Splits a path into its parent path and final name segment.
    /// Returns `None` when the path names the base itself.
    pub fn split_parent(path: &str) -> Option<(String, String)> {
        let mut segments = Self::split_segments(path);
        let name = segments.pop()?;
        Some((segments.join("/"), name.to_string()))
    }

    /// Resolves to a node or `None` when any segment is missing. A
    /// missing root is indistinguishable from a missing leaf.
    pub async fn resolve(&self, base: &str, path: &str) -> Result<Option<NodeId>, BridgeError> {
        self.check_base(base)?;
        let root = self.root().await?;
        let segments = Self::split_segments(path);
        Ok(self.repo.resolve_path(root, &segments).await?)
    }

    /// Like [`resolve`](Self::resolve) but maps absence to `ENOENT`.
    pub async fn require(&self, base: &str, path: &str) -> Result<NodeId, BridgeError> {
        self.resolve(base, path)
            .await?
            .ok_or_else(|| BridgeError::not_found(format!("no such path: {path}")))
    }
}
