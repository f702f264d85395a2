use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Dictionary, NodeKind, TypeRegistry};
use crate::qname::{Namespaces, QName};
use crate::value::{ContentData, TypedValue};

/// Opaque node identifier, displayed as `repo://main/<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repo://main/{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("name already exists: {0}")]
    NameExists(String),
    #[error("unknown node type: {0}")]
    UnknownType(QName),
    #[error("node has no content stream: {0}")]
    NoContent(NodeId),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A directory child as reported by the backend.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub name: String,
    pub node: NodeId,
    pub kind: NodeKind,
}

/// Storage figures reported by the backing content store.
#[derive(Debug, Clone, Copy)]
pub struct StorageStats {
    pub free_bytes: u64,
    pub total_bytes: u64,
    pub usable_bytes: u64,
}

/// Transaction boundary guard. Dropping the guard ends the boundary;
/// conflict retry, if any, happens inside the backend, never here.
pub struct Txn {
    _guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Txn {
    pub fn none() -> Self {
        Self { _guard: None }
    }

    pub fn held(guard: tokio::sync::OwnedMutexGuard<()>) -> Self {
        Self {
            _guard: Some(guard),
        }
    }
}

/// Scope during which automatic `doc:modified` tracking is disabled
/// for one node. Tracking is restored on drop, on every exit path.
pub struct AuditPause {
    restore: Option<Box<dyn FnOnce() + Send>>,
}

impl AuditPause {
    pub fn new(restore: impl FnOnce() + Send + 'static) -> Self {
        Self {
            restore: Some(Box::new(restore)),
        }
    }

    pub fn none() -> Self {
        Self { restore: None }
    }
}

impl Drop for AuditPause {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore();
        }
    }
}

/// Read handle over a node's content stream.
#[async_trait]
pub trait ContentRead: Send {
    fn content_data(&self) -> &ContentData;

    fn size(&self) -> u64;

    /// Read up to `len` bytes starting at `offset`. Out-of-range
    /// requests are clamped to the stream end.
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes, StoreError>;
}

/// Write handle over a node's content stream. Nothing is visible to
/// readers until `commit`, which allocates a fresh location token.
#[async_trait]
pub trait ContentWrite: Send {
    fn size(&self) -> u64;

    fn set_mimetype(&mut self, mimetype: String);

    fn set_encoding(&mut self, encoding: String);

    /// Write `data` at `offset`, zero-filling any gap between the
    /// current end and `offset`. Returns the number of bytes taken
    /// from `data`.
    async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<u64, StoreError>;

    /// Shrink or zero-extend the stream to exactly `len` bytes.
    async fn set_len(&mut self, len: u64) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<ContentData, StoreError>;
}

/// The backend repository interface. The translation layer consumes
/// this contract and never reaches around it; transaction retry and
/// storage details stay behind it.
#[async_trait]
pub trait Repository: Send + Sync {
    /// The well-known root node. Fails only on backend misconfiguration.
    async fn root(&self) -> Result<NodeId, StoreError>;

    /// Resolve an ordered sequence of child names below `base`.
    /// `Ok(None)` when any segment is missing.
    async fn resolve_path(
        &self,
        base: NodeId,
        segments: &[&str],
    ) -> Result<Option<NodeId>, StoreError>;

    async fn properties(&self, node: NodeId) -> Result<BTreeMap<QName, TypedValue>, StoreError>;

    async fn set_property(
        &self,
        node: NodeId,
        name: QName,
        value: TypedValue,
    ) -> Result<(), StoreError>;

    async fn remove_property(&self, node: NodeId, name: &QName) -> Result<(), StoreError>;

    async fn aspects(&self, node: NodeId) -> Result<BTreeSet<QName>, StoreError>;

    async fn add_aspect(&self, node: NodeId, aspect: QName) -> Result<(), StoreError>;

    async fn remove_aspect(&self, node: NodeId, aspect: &QName) -> Result<(), StoreError>;

    async fn node_type(&self, node: NodeId) -> Result<QName, StoreError>;

    async fn set_node_type(&self, node: NodeId, type_tag: QName) -> Result<(), StoreError>;

    /// Create a child node. The new node carries no content stream;
    /// seeding one is the caller's concern.
    async fn create_node(
        &self,
        parent: NodeId,
        name: &str,
        type_tag: QName,
    ) -> Result<NodeId, StoreError>;

    /// Delete a node and, transitively, its descendants.
    async fn delete_node(&self, node: NodeId) -> Result<(), StoreError>;

    /// Move `node` under `new_parent` (or rename in place when `None`)
    /// with the given new name.
    async fn move_node(
        &self,
        node: NodeId,
        new_parent: Option<NodeId>,
        new_name: &str,
    ) -> Result<(), StoreError>;

    /// `Ok(None)` when the node has no content stream.
    async fn open_reader(&self, node: NodeId)
        -> Result<Option<Box<dyn ContentRead>>, StoreError>;

    async fn open_writer(
        &self,
        node: NodeId,
        truncate: bool,
    ) -> Result<Box<dyn ContentWrite>, StoreError>;

    async fn list_children(&self, node: NodeId) -> Result<Vec<ChildEntry>, StoreError>;

    async fn count_children(&self, node: NodeId, recursive: bool) -> Result<u64, StoreError>;

    /// Number of parent associations (the hard-link count for files).
    async fn parent_count(&self, node: NodeId) -> Result<u32, StoreError>;

    /// Open a transaction boundary for a mutation.
    async fn begin(&self) -> Txn;

    /// Disable automatic `doc:modified` tracking for `node` until the
    /// returned guard drops.
    fn suspend_audit(&self, node: NodeId) -> AuditPause;

    fn namespaces(&self) -> &Namespaces;

    fn dictionary(&self) -> &Dictionary;

    fn types(&self) -> &TypeRegistry;

    async fn storage_stats(&self) -> Result<StorageStats, StoreError>;

    fn read_only(&self) -> bool;
}
