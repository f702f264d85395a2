use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::model::{self, Dictionary, NodeKind, TypeRegistry};
use crate::qname::{Namespaces, QName};
use crate::repo::{
    AuditPause, ChildEntry, ContentRead, ContentWrite, NodeId, Repository, StorageStats,
    StoreError, Txn,
};
use crate::value::{ContentData, TypedValue};

#[derive(Debug)]
struct NodeRecord {
    type_tag: QName,
    aspects: BTreeSet<QName>,
    props: BTreeMap<QName, TypedValue>,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
}

#[derive(Debug)]
struct Inner {
    root: NodeId,
    nodes: HashMap<NodeId, NodeRecord>,
    /// Content blobs by location token. Tokens are never reused, so
    /// committed streams behave copy-on-write.
    blobs: HashMap<String, Bytes>,
}

/// In-memory repository. Nodes live in a single locked map; every
/// committed content write allocates a fresh location token.
#[derive(Clone)]
pub struct MemoryRepository {
    inner: Arc<RwLock<Inner>>,
    suspended: Arc<Mutex<HashSet<NodeId>>>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    namespaces: Namespaces,
    dictionary: Dictionary,
    types: TypeRegistry,
    stats: StorageStats,
    read_only: bool,
    owner: String,
}

impl MemoryRepository {
    pub fn new() -> Self {
        let root = NodeId::generate();
        let now = Utc::now();
        let mut nodes = HashMap::new();
        let mut props = BTreeMap::new();
        props.insert(model::prop_name(), TypedValue::Text("root".to_string()));
        props.insert(model::prop_created(), TypedValue::DateTime(now));
        props.insert(model::prop_modified(), TypedValue::DateTime(now));
        props.insert(model::prop_owner(), TypedValue::Text("admin".to_string()));
        nodes.insert(
            root,
            NodeRecord {
                type_tag: model::type_folder(),
                aspects: BTreeSet::from([model::aspect_audited()]),
                props,
                parent: None,
                children: BTreeMap::new(),
            },
        );
        Self {
            inner: Arc::new(RwLock::new(Inner {
                root,
                nodes,
                blobs: HashMap::new(),
            })),
            suspended: Arc::new(Mutex::new(HashSet::new())),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            namespaces: Namespaces::builtin(),
            dictionary: Dictionary::builtin(),
            types: TypeRegistry::builtin(),
            stats: StorageStats {
                free_bytes: 64 << 30,
                total_bytes: 128 << 30,
                usable_bytes: 64 << 30,
            },
            read_only: false,
            owner: "admin".to_string(),
        }
    }

    /// Register an additional namespace prefix. Call before sharing
    /// the repository.
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) {
        self.namespaces.register(prefix, uri);
    }

    /// Declare an additional property in the dictionary.
    pub fn define_property(&mut self, name: QName, kind: crate::value::PropertyKind) {
        self.dictionary.define(name, kind);
    }

    /// Register an additional node type below `parent`.
    pub fn define_type(&mut self, type_tag: QName, parent: QName) {
        self.types.define(type_tag, parent);
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn bump_modified(&self, inner: &mut Inner, node: NodeId) {
        if self.suspended.lock().contains(&node) {
            return;
        }
        if let Some(record) = inner.nodes.get_mut(&node) {
            if record.aspects.contains(&model::aspect_audited()) {
                record
                    .props
                    .insert(model::prop_modified(), TypedValue::DateTime(Utc::now()));
            }
        }
    }

    fn record<'a>(inner: &'a Inner, node: NodeId) -> Result<&'a NodeRecord, StoreError> {
        inner.nodes.get(&node).ok_or(StoreError::NodeNotFound(node))
    }

    fn record_mut<'a>(
        inner: &'a mut Inner,
        node: NodeId,
    ) -> Result<&'a mut NodeRecord, StoreError> {
        inner
            .nodes
            .get_mut(&node)
            .ok_or(StoreError::NodeNotFound(node))
    }

    fn collect_subtree(inner: &Inner, node: NodeId, out: &mut Vec<NodeId>) {
        out.push(node);
        if let Some(record) = inner.nodes.get(&node) {
            for child in record.children.values() {
                Self::collect_subtree(inner, *child, out);
            }
        }
    }

    fn fresh_location() -> String {
        format!(
            "store://{}/{}.bin",
            Utc::now().format("%Y/%m/%d"),
            Uuid::new_v4()
        )
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryReader {
    content: ContentData,
    bytes: Bytes,
}

#[async_trait]
impl ContentRead for MemoryReader {
    fn content_data(&self) -> &ContentData {
        &self.content
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes, StoreError> {
        let total = self.bytes.len() as u64;
        let start = offset.min(total) as usize;
        let end = offset.saturating_add(len).min(total) as usize;
        Ok(self.bytes.slice(start..end))
    }
}

struct MemoryWriter {
    repo: MemoryRepository,
    node: NodeId,
    buf: Vec<u8>,
    encoding: Option<String>,
    mimetype: Option<String>,
    locale: Option<crate::value::Locale>,
}

#[async_trait]
impl ContentWrite for MemoryWriter {
    fn size(&self) -> u64 {
        self.buf.len() as u64
    }

    fn set_mimetype(&mut self, mimetype: String) {
        self.mimetype = Some(mimetype);
    }

    fn set_encoding(&mut self, encoding: String) {
        self.encoding = Some(encoding);
    }

    async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<u64, StoreError> {
        let end = offset as usize + data.len();
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[offset as usize..end].copy_from_slice(data);
        Ok(data.len() as u64)
    }

    async fn set_len(&mut self, len: u64) -> Result<(), StoreError> {
        self.buf.resize(len as usize, 0);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<ContentData, StoreError> {
        let location = MemoryRepository::fresh_location();
        let content = ContentData {
            encoding: self.encoding.clone(),
            mimetype: self.mimetype.clone(),
            locale: self.locale.clone(),
            size: self.buf.len() as u64,
            location: location.clone(),
        };
        let mut inner = self.repo.inner.write();
        let record = MemoryRepository::record_mut(&mut inner, self.node)?;
        record
            .props
            .insert(model::prop_content(), TypedValue::Content(content.clone()));
        inner.blobs.insert(location, Bytes::from(self.buf));
        self.repo.bump_modified(&mut inner, self.node);
        Ok(content)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn root(&self) -> Result<NodeId, StoreError> {
        Ok(self.inner.read().root)
    }

    async fn resolve_path(
        &self,
        base: NodeId,
        segments: &[&str],
    ) -> Result<Option<NodeId>, StoreError> {
        let inner = self.inner.read();
        if !inner.nodes.contains_key(&base) {
            return Ok(None);
        }
        let mut current = base;
        for segment in segments {
            let record = match inner.nodes.get(&current) {
                Some(r) => r,
                None => return Ok(None),
            };
            match record.children.get(*segment) {
                Some(child) => current = *child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    async fn properties(&self, node: NodeId) -> Result<BTreeMap<QName, TypedValue>, StoreError> {
        let inner = self.inner.read();
        Ok(Self::record(&inner, node)?.props.clone())
    }

    async fn set_property(
        &self,
        node: NodeId,
        name: QName,
        value: TypedValue,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        Self::record_mut(&mut inner, node)?.props.insert(name, value);
        self.bump_modified(&mut inner, node);
        Ok(())
    }

    async fn remove_property(&self, node: NodeId, name: &QName) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        Self::record_mut(&mut inner, node)?.props.remove(name);
        self.bump_modified(&mut inner, node);
        Ok(())
    }

    async fn aspects(&self, node: NodeId) -> Result<BTreeSet<QName>, StoreError> {
        let inner = self.inner.read();
        Ok(Self::record(&inner, node)?.aspects.clone())
    }

    async fn add_aspect(&self, node: NodeId, aspect: QName) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        Self::record_mut(&mut inner, node)?.aspects.insert(aspect);
        self.bump_modified(&mut inner, node);
        Ok(())
    }

    async fn remove_aspect(&self, node: NodeId, aspect: &QName) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        Self::record_mut(&mut inner, node)?.aspects.remove(aspect);
        self.bump_modified(&mut inner, node);
        Ok(())
    }

    async fn node_type(&self, node: NodeId) -> Result<QName, StoreError> {
        let inner = self.inner.read();
        Ok(Self::record(&inner, node)?.type_tag.clone())
    }

    async fn set_node_type(&self, node: NodeId, type_tag: QName) -> Result<(), StoreError> {
        if !self.types.is_known(&type_tag) {
            return Err(StoreError::UnknownType(type_tag));
        }
        let mut inner = self.inner.write();
        Self::record_mut(&mut inner, node)?.type_tag = type_tag;
        self.bump_modified(&mut inner, node);
        Ok(())
    }

    async fn create_node(
        &self,
        parent: NodeId,
        name: &str,
        type_tag: QName,
    ) -> Result<NodeId, StoreError> {
        if !self.types.is_known(&type_tag) {
            return Err(StoreError::UnknownType(type_tag));
        }
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&parent) {
            return Err(StoreError::NodeNotFound(parent));
        }
        if Self::record(&inner, parent)?.children.contains_key(name) {
            return Err(StoreError::NameExists(name.to_string()));
        }
        let node = NodeId::generate();
        let now = Utc::now();
        let mut props = BTreeMap::new();
        props.insert(model::prop_name(), TypedValue::Text(name.to_string()));
        props.insert(model::prop_created(), TypedValue::DateTime(now));
        props.insert(model::prop_modified(), TypedValue::DateTime(now));
        props.insert(model::prop_owner(), TypedValue::Text(self.owner.clone()));
        inner.nodes.insert(
            node,
            NodeRecord {
                type_tag,
                aspects: BTreeSet::from([model::aspect_audited()]),
                props,
                parent: Some(parent),
                children: BTreeMap::new(),
            },
        );
        Self::record_mut(&mut inner, parent)?
            .children
            .insert(name.to_string(), node);
        debug!(%node, name, "node created");
        Ok(node)
    }

    async fn delete_node(&self, node: NodeId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let parent = Self::record(&inner, node)?.parent;
        let mut doomed = Vec::new();
        Self::collect_subtree(&inner, node, &mut doomed);
        debug!(%node, count = doomed.len(), "deleting subtree");
        for id in doomed {
            inner.nodes.remove(&id);
        }
        if let Some(parent) = parent {
            if let Some(record) = inner.nodes.get_mut(&parent) {
                record.children.retain(|_, child| *child != node);
            }
        }
        Ok(())
    }

    async fn move_node(
        &self,
        node: NodeId,
        new_parent: Option<NodeId>,
        new_name: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let old_parent = Self::record(&inner, node)?
            .parent
            .ok_or(StoreError::NodeNotFound(node))?;
        let dest = new_parent.unwrap_or(old_parent);
        if !inner.nodes.contains_key(&dest) {
            return Err(StoreError::NodeNotFound(dest));
        }
        if let Some(existing) = Self::record(&inner, dest)?.children.get(new_name) {
            if *existing != node {
                return Err(StoreError::NameExists(new_name.to_string()));
            }
        }
        if let Some(record) = inner.nodes.get_mut(&old_parent) {
            record.children.retain(|_, child| *child != node);
        }
        Self::record_mut(&mut inner, dest)?
            .children
            .insert(new_name.to_string(), node);
        let record = Self::record_mut(&mut inner, node)?;
        record.parent = Some(dest);
        record
            .props
            .insert(model::prop_name(), TypedValue::Text(new_name.to_string()));
        self.bump_modified(&mut inner, node);
        Ok(())
    }

    async fn open_reader(
        &self,
        node: NodeId,
    ) -> Result<Option<Box<dyn ContentRead>>, StoreError> {
        let inner = self.inner.read();
        let record = Self::record(&inner, node)?;
        let content = match record.props.get(&model::prop_content()) {
            Some(TypedValue::Content(c)) => c.clone(),
            _ => return Ok(None),
        };
        let bytes = inner
            .blobs
            .get(&content.location)
            .cloned()
            .unwrap_or_default();
        Ok(Some(Box::new(MemoryReader { content, bytes })))
    }

    async fn open_writer(
        &self,
        node: NodeId,
        truncate: bool,
    ) -> Result<Box<dyn ContentWrite>, StoreError> {
        let inner = self.inner.read();
        let record = Self::record(&inner, node)?;
        let existing = match record.props.get(&model::prop_content()) {
            Some(TypedValue::Content(c)) => Some(c.clone()),
            _ => None,
        };
        let buf = if truncate {
            Vec::new()
        } else {
            existing
                .as_ref()
                .and_then(|c| inner.blobs.get(&c.location))
                .map(|b| b.to_vec())
                .unwrap_or_default()
        };
        Ok(Box::new(MemoryWriter {
            repo: self.clone(),
            node,
            buf,
            encoding: existing.as_ref().and_then(|c| c.encoding.clone()),
            mimetype: existing.as_ref().and_then(|c| c.mimetype.clone()),
            locale: existing.as_ref().and_then(|c| c.locale.clone()),
        }))
    }

    async fn list_children(&self, node: NodeId) -> Result<Vec<ChildEntry>, StoreError> {
        let inner = self.inner.read();
        let record = Self::record(&inner, node)?;
        let mut entries = Vec::with_capacity(record.children.len());
        for (name, child) in &record.children {
            let child_record = Self::record(&inner, *child)?;
            let kind = self
                .types
                .kind_of(&child_record.type_tag)
                .unwrap_or(NodeKind::File);
            entries.push(ChildEntry {
                name: name.clone(),
                node: *child,
                kind,
            });
        }
        Ok(entries)
    }

    async fn count_children(&self, node: NodeId, recursive: bool) -> Result<u64, StoreError> {
        let inner = self.inner.read();
        let record = Self::record(&inner, node)?;
        if !recursive {
            return Ok(record.children.len() as u64);
        }
        let mut count = 0;
        let mut stack: Vec<NodeId> = record.children.values().copied().collect();
        while let Some(id) = stack.pop() {
            count += 1;
            if let Some(record) = inner.nodes.get(&id) {
                stack.extend(record.children.values().copied());
            }
        }
        Ok(count)
    }

    async fn parent_count(&self, node: NodeId) -> Result<u32, StoreError> {
        let inner = self.inner.read();
        Ok(Self::record(&inner, node)?.parent.map_or(0, |_| 1))
    }

    async fn begin(&self) -> Txn {
        Txn::held(self.write_lock.clone().lock_owned().await)
    }

    fn suspend_audit(&self, node: NodeId) -> AuditPause {
        self.suspended.lock().insert(node);
        let suspended = self.suspended.clone();
        AuditPause::new(move || {
            suspended.lock().remove(&node);
        })
    }

    fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    async fn storage_stats(&self) -> Result<StorageStats, StoreError> {
        Ok(self.stats)
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}
