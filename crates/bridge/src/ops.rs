use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use store::model;
use store::prelude::{NodeId, NodeKind, Repository, StoreError, TypedValue};

use crate::content::{ContentIo, ReadOutcome, WriteOutcome};
use crate::error::{BridgeError, Errno};
use crate::rename::RenameCoordinator;
use crate::resolve::{PathResolver, SUPPORTED_BASE};
use crate::stat::{node_kind, StatBuilder, StatFs, StatRecord};
use crate::xattr::{AttributeCodec, XattrMode};

/// Deployment configuration for the translation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// The single base identifier requests must name.
    pub base: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base: SUPPORTED_BASE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub base: String,
    pub path: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Open flags from the client; accepted for interface parity,
    /// no flag currently alters create behavior.
    #[serde(default)]
    pub flags: Option<u32>,
}

/// Identity of a resolved or created node.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    pub node_id: String,
    pub uuid: String,
}

impl NodeRef {
    fn of(node: NodeId) -> Self {
        Self {
            node_id: node.to_string(),
            uuid: node.uuid().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReaddirReply {
    pub total: u64,
    pub entries: Vec<DirEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadRequest {
    pub base: String,
    pub path: String,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub if_none_match: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub base: String,
    pub path: String,
    pub offset: u64,
    pub size: u64,
    #[serde(default)]
    pub truncate: bool,
    /// Modification-time override, epoch seconds.
    #[serde(default)]
    pub mtime: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteReply {
    pub transferred: u64,
    pub etag: String,
}

#[derive(Debug, Deserialize)]
pub struct GetXattrRequest {
    pub base: String,
    pub path: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub mode: Option<GetXattrMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GetXattrMode {
    #[serde(rename = "onlykeys")]
    OnlyKeys,
}

/// getxattr answers one of three shapes depending on the request.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum XattrReply {
    Value {
        key: String,
        value: Option<String>,
    },
    Map(BTreeMap<String, Option<String>>),
    Keys(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct SetXattrRequest {
    pub base: String,
    pub path: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub mode: XattrMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveXattrReply {
    pub key: String,
    pub previous: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UtimensRequest {
    pub base: String,
    pub path: String,
    #[serde(default)]
    pub atime_sec: Option<i64>,
    #[serde(default)]
    pub atime_nsec: Option<u32>,
    #[serde(default)]
    pub mtime_sec: Option<i64>,
    #[serde(default)]
    pub mtime_nsec: Option<u32>,
}

/// Echo of the timestamps actually stored.
#[derive(Debug, Serialize, Deserialize)]
pub struct UtimensReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
}

/// The transport-agnostic operation surface. One instance serves
/// concurrent requests; all state lives in the backend apart from the
/// cached root handle.
#[derive(Clone)]
pub struct Bridge {
    repo: Arc<dyn Repository>,
    resolver: Arc<PathResolver>,
    codec: AttributeCodec,
    content: ContentIo,
    rename: RenameCoordinator,
    stat: StatBuilder,
}

impl Bridge {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self::with_config(repo, BridgeConfig::default())
    }

    pub fn with_config(repo: Arc<dyn Repository>, config: BridgeConfig) -> Self {
        let resolver = Arc::new(PathResolver::with_base(repo.clone(), config.base));
        Self {
            codec: AttributeCodec::new(repo.clone()),
            content: ContentIo::new(repo.clone()),
            rename: RenameCoordinator::new(resolver.clone()),
            stat: StatBuilder::new(repo.clone()),
            resolver,
            repo,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Creates a node. File-kind nodes are seeded with an empty
    /// content stream and a name-guessed MIME type.
    #[instrument(skip(self), fields(path = %req.path))]
    pub async fn create(&self, req: &CreateRequest) -> Result<NodeRef, BridgeError> {
        let (parent_path, name) = PathResolver::split_parent(&req.path)
            .ok_or_else(|| BridgeError::bad_input("cannot create the base itself"))?;
        let parent = self
            .resolver
            .resolve(&req.base, &parent_path)
            .await?
            .ok_or_else(|| BridgeError::not_found(format!("no such directory: {parent_path}")))?;
        let type_tag = self
            .repo
            .namespaces()
            .resolve(&req.type_tag)
            .map_err(|e| BridgeError::bad_input(e.to_string()))?;
        let kind = self
            .repo
            .types()
            .kind_of(&type_tag)
            .ok_or_else(|| BridgeError::not_supported(format!("unknown type: {type_tag}")))?;

        let _txn = self.repo.begin().await;
        let node = self
            .repo
            .create_node(parent, &name, type_tag)
            .await
            .map_err(|err| match err {
                StoreError::NameExists(name) => {
                    BridgeError::errno(Errno::EEXIST, format!("already exists: {name}"))
                }
                other => other.into(),
            })?;
        if kind == NodeKind::File {
            self.content.seed(node, &name).await?;
        }
        debug!(%node, "created");
        Ok(NodeRef::of(node))
    }

    /// Resolves a path without side effects.
    pub async fn lookup(&self, base: &str, path: &str) -> Result<NodeRef, BridgeError> {
        let node = self.resolver.require(base, path).await?;
        Ok(NodeRef::of(node))
    }

    pub async fn readdir(&self, base: &str, path: &str) -> Result<ReaddirReply, BridgeError> {
        let node = self.resolver.require(base, path).await?;
        let children = self.repo.list_children(node).await?;
        let entries: Vec<DirEntry> = children
            .into_iter()
            .map(|child| DirEntry {
                name: child.name,
                kind: child.kind,
            })
            .collect();
        Ok(ReaddirReply {
            total: entries.len() as u64,
            entries,
        })
    }

    pub async fn read(&self, req: &ReadRequest) -> Result<ReadOutcome, BridgeError> {
        let node = self.resolver.require(&req.base, &req.path).await?;
        self.content
            .read(node, req.offset, req.size, req.if_none_match.as_deref())
            .await
    }

    /// Writes `body` at the requested offset. `size` must match the
    /// body length exactly.
    pub async fn write(
        &self,
        req: &WriteRequest,
        body: Bytes,
    ) -> Result<WriteReply, BridgeError> {
        if body.len() as u64 != req.size {
            return Err(BridgeError::bad_input(format!(
                "size {} does not match body length {}",
                req.size,
                body.len()
            )));
        }
        let node = self.resolver.require(&req.base, &req.path).await?;
        let mtime = req
            .mtime
            .map(|sec| {
                DateTime::from_timestamp(sec, 0)
                    .ok_or_else(|| BridgeError::bad_input(format!("mtime out of range: {sec}")))
            })
            .transpose()?;
        let WriteOutcome { transferred, etag } = self
            .content
            .write(node, req.offset, &body, req.truncate, mtime)
            .await?;
        Ok(WriteReply { transferred, etag })
    }

    pub async fn truncate(&self, base: &str, path: &str, offset: u64) -> Result<(), BridgeError> {
        let node = self.resolver.require(base, path).await?;
        self.content.truncate(node, offset).await
    }

    #[instrument(skip(self))]
    pub async fn rename(&self, base: &str, path: &str, newpath: &str) -> Result<(), BridgeError> {
        self.rename.rename(base, path, newpath).await
    }

    /// Removes an empty directory. Emptiness counts all descendants.
    pub async fn rmdir(&self, base: &str, path: &str) -> Result<(), BridgeError> {
        let node = self.resolver.require(base, path).await?;
        if node_kind(self.repo.as_ref(), node).await? != NodeKind::Directory {
            return Err(BridgeError::errno(
                Errno::ENOTDIR,
                format!("not a directory: {path}"),
            ));
        }
        if self.repo.count_children(node, true).await? > 0 {
            return Err(BridgeError::errno(
                Errno::ENOTEMPTY,
                format!("directory not empty: {path}"),
            ));
        }
        let _txn = self.repo.begin().await;
        self.repo.delete_node(node).await?;
        Ok(())
    }

    pub async fn stat(&self, base: &str, path: &str) -> Result<StatRecord, BridgeError> {
        let node = self.resolver.require(base, path).await?;
        self.stat.stat(node).await
    }

    pub async fn statfs(&self) -> Result<StatFs, BridgeError> {
        self.stat.statfs().await
    }

    pub async fn getxattr(&self, req: &GetXattrRequest) -> Result<XattrReply, BridgeError> {
        let node = self.resolver.require(&req.base, &req.path).await?;
        match (&req.key, req.mode) {
            (Some(key), _) => {
                let value = self.codec.marshal_one(node, key).await?;
                Ok(XattrReply::Value {
                    key: key.clone(),
                    value,
                })
            }
            (None, Some(GetXattrMode::OnlyKeys)) => {
                Ok(XattrReply::Keys(self.codec.keys(node).await?))
            }
            (None, None) => Ok(XattrReply::Map(self.codec.marshal_all(node).await?)),
        }
    }

    pub async fn setxattr(&self, req: &SetXattrRequest) -> Result<(), BridgeError> {
        let node = self.resolver.require(&req.base, &req.path).await?;
        self.codec
            .unmarshal(node, &req.key, &req.value, req.mode)
            .await
    }

    pub async fn removexattr(
        &self,
        base: &str,
        path: &str,
        key: &str,
    ) -> Result<RemoveXattrReply, BridgeError> {
        let node = self.resolver.require(base, path).await?;
        let previous = self.codec.remove(node, key).await?;
        Ok(RemoveXattrReply {
            key: key.to_string(),
            previous,
        })
    }

    /// Sets access and modification times with nanosecond composition.
    /// Audit tracking is suspended so the stored values survive the
    /// call that sets them.
    pub async fn utimens(&self, req: &UtimensRequest) -> Result<UtimensReply, BridgeError> {
        let node = self.resolver.require(&req.base, &req.path).await?;
        let atime = compose_time(req.atime_sec, req.atime_nsec)?;
        let mtime = compose_time(req.mtime_sec, req.mtime_nsec)?;

        let _txn = self.repo.begin().await;
        let _pause = self.repo.suspend_audit(node);
        if let Some(atime) = atime {
            self.repo
                .set_property(node, model::prop_accessed(), TypedValue::DateTime(atime))
                .await?;
        }
        if let Some(mtime) = mtime {
            self.repo
                .set_property(node, model::prop_modified(), TypedValue::DateTime(mtime))
                .await?;
        }
        Ok(UtimensReply {
            atime: atime.map(iso),
            mtime: mtime.map(iso),
        })
    }
}

fn compose_time(
    sec: Option<i64>,
    nsec: Option<u32>,
) -> Result<Option<DateTime<Utc>>, BridgeError> {
    let Some(sec) = sec else {
        return Ok(None);
    };
    let nsec = nsec.unwrap_or(0);
    DateTime::from_timestamp(sec, nsec)
        .map(Some)
        .ok_or_else(|| BridgeError::bad_input(format!("timestamp out of range: {sec}.{nsec}")))
}

fn iso(dt: DateTime<Utc>) -> String {
    dt.format(crate::xattr::ISO_DATETIME).to_string()
}
