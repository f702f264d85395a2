use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use store::model;
use store::prelude::{NodeId, NodeKind, Repository, TypedValue};

use crate::error::BridgeError;
use crate::xattr::ISO_DATETIME;

const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;

const BLOCK_SIZE: u32 = 4096;
pub const MAX_FILENAME: u32 = 250;

/// Classifies a node by its type tag's subclass chain. A tag outside
/// all three kind roots means the type registry is misconfigured.
pub(crate) async fn node_kind(
    repo: &dyn Repository,
    node: NodeId,
) -> Result<NodeKind, BridgeError> {
    let type_tag = repo.node_type(node).await?;
    repo.types().kind_of(&type_tag).ok_or_else(|| {
        BridgeError::Internal(anyhow::anyhow!("type tag outside kind roots: {type_tag}"))
    })
}

/// POSIX stat-equivalent record. Timestamps appear both as ISO-8601
/// UTC strings and epoch seconds, each only when the backing property
/// exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatRecord {
    pub mode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub nlink: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atime_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctime_sec: Option<i64>,
    pub blksize: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<u64>,
}

/// Filesystem-level capacity record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatFs {
    pub free_bytes: u64,
    pub total_bytes: u64,
    pub usable_bytes: u64,
    pub max_filename: u32,
    pub read_only: bool,
}

#[derive(Clone)]
pub struct StatBuilder {
    repo: Arc<dyn Repository>,
}

impl StatBuilder {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn stat(&self, node: NodeId) -> Result<StatRecord, BridgeError> {
        let kind = node_kind(self.repo.as_ref(), node).await?;
        let props = self.repo.properties(node).await?;

        let (mode, nlink) = match kind {
            NodeKind::Directory => (S_IFDIR | 0o755, 2),
            NodeKind::File => (
                S_IFREG | 0o644,
                self.repo.parent_count(node).await?.max(1),
            ),
            NodeKind::Link => (S_IFLNK | 0o644, 1),
        };

        // size and blocks only make sense for regular files
        let (size, blocks) = if kind == NodeKind::File {
            let size = match props.get(&model::prop_content()) {
                Some(TypedValue::Content(cdata)) => cdata.size,
                _ => 0,
            };
            (Some(size), Some(1 + size / 512))
        } else {
            (None, None)
        };

        let uid = props
            .get(&model::prop_owner())
            .and_then(|v| v.as_text().map(str::to_string));
        let atime = timestamp(&props, &model::prop_accessed());
        let mtime = timestamp(&props, &model::prop_modified());
        let ctime = timestamp(&props, &model::prop_created());

        Ok(StatRecord {
            mode,
            uid,
            size,
            nlink,
            atime_sec: atime.as_ref().map(|t| t.1),
            atime: atime.map(|t| t.0),
            mtime_sec: mtime.as_ref().map(|t| t.1),
            mtime: mtime.map(|t| t.0),
            ctime_sec: ctime.as_ref().map(|t| t.1),
            ctime: ctime.map(|t| t.0),
            blksize: BLOCK_SIZE,
            blocks,
        })
    }

    pub async fn statfs(&self) -> Result<StatFs, BridgeError> {
        let stats = self.repo.storage_stats().await?;
        Ok(StatFs {
            free_bytes: stats.free_bytes,
            total_bytes: stats.total_bytes,
            usable_bytes: stats.usable_bytes,
            max_filename: MAX_FILENAME,
            read_only: self.repo.read_only(),
        })
    }
}

fn timestamp(
    props: &std::collections::BTreeMap<store::prelude::QName, TypedValue>,
    name: &store::prelude::QName,
) -> Option<(String, i64)> {
    props.get(name).and_then(TypedValue::as_datetime).map(|dt| {
        (
            format_iso(dt),
            dt.timestamp(),
        )
    })
}

fn format_iso(dt: DateTime<Utc>) -> String {
    dt.format(ISO_DATETIME).to_string()
}
