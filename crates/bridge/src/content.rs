use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use store::model;
use store::prelude::{NodeId, Repository, TypedValue};

use crate::error::BridgeError;

/// Zero-fill writes during a growing truncate happen in chunks of this
/// size, never one allocation proportional to the gap.
const ZERO_FILL_CHUNK: u64 = 4096;

/// Derives a cache-validation token from a content location. The
/// backend allocates location tokens copy-on-write, so equal tokens
/// imply equal bytes.
pub fn etag_for_location(location: &str) -> String {
    location
        .strip_prefix("store://")
        .unwrap_or(location)
        .replace('/', "_")
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[derive(Debug)]
pub struct ReadOutcome {
    pub body: Bytes,
    /// Present only for whole-file reads; ranged reads are not
    /// cacheable by whole-file identity.
    pub etag: Option<String>,
    pub not_modified: bool,
    pub mimetype: Option<String>,
}

impl ReadOutcome {
    fn empty() -> Self {
        Self {
            body: Bytes::new(),
            etag: None,
            not_modified: false,
            mimetype: None,
        }
    }
}

#[derive(Debug)]
pub struct WriteOutcome {
    pub transferred: u64,
    pub etag: String,
}

/// Ranged content read/write over the backend stream handles.
#[derive(Clone)]
pub struct ContentIo {
    repo: Arc<dyn Repository>,
}

impl ContentIo {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Reads a byte range, or the whole stream when neither offset nor
    /// size is given. Whole reads carry an ETag and honor
    /// `If-None-Match`; a node without content yields an empty body.
    pub async fn read(
        &self,
        node: NodeId,
        offset: Option<u64>,
        size: Option<u64>,
        if_none_match: Option<&str>,
    ) -> Result<ReadOutcome, BridgeError> {
        let reader = match self.repo.open_reader(node).await? {
            Some(reader) => reader,
            None => return Ok(ReadOutcome::empty()),
        };
        let total = reader.size();
        let mimetype = reader.content_data().mimetype.clone();

        if offset.is_none() && size.is_none() {
            let etag = etag_for_location(&reader.content_data().location);
            if let Some(candidate) = if_none_match {
                if strip_quotes(candidate) == etag {
                    debug!(%node, etag, "conditional read matched, not modified");
                    return Ok(ReadOutcome {
                        body: Bytes::new(),
                        etag: Some(etag),
                        not_modified: true,
                        mimetype,
                    });
                }
            }
            let body = reader.read_range(0, total).await?;
            return Ok(ReadOutcome {
                body,
                etag: Some(etag),
                not_modified: false,
                mimetype,
            });
        }

        let offset = offset.unwrap_or(0);
        let remaining = total.saturating_sub(offset);
        let served = size.map_or(remaining, |s| s.min(remaining));
        let body = reader.read_range(offset, served).await?;
        Ok(ReadOutcome {
            body,
            etag: None,
            not_modified: false,
            mimetype,
        })
    }

    /// Writes `data` at `offset` inside one transaction. A supplied
    /// modification-time override is stored with audit tracking
    /// suspended so automatic tracking does not clobber it.
    pub async fn write(
        &self,
        node: NodeId,
        offset: u64,
        data: &[u8],
        truncate: bool,
        mtime: Option<DateTime<Utc>>,
    ) -> Result<WriteOutcome, BridgeError> {
        let _txn = self.repo.begin().await;
        let pause = mtime.map(|_| self.repo.suspend_audit(node));

        let mut writer = self.repo.open_writer(node, truncate).await?;
        let transferred = writer.write_at(offset, data).await?;
        let content = writer.commit().await?;
        if let Some(mtime) = mtime {
            self.repo
                .set_property(node, model::prop_modified(), TypedValue::DateTime(mtime))
                .await?;
        }
        drop(pause);
        Ok(WriteOutcome {
            transferred,
            etag: etag_for_location(&content.location),
        })
    }

    /// Truncates the stream to exactly `offset` bytes: truncate-to-zero
    /// empties the stream, shrink cuts in place, grow extends with
    /// zero bytes in bounded chunks.
    pub async fn truncate(&self, node: NodeId, offset: u64) -> Result<(), BridgeError> {
        let _txn = self.repo.begin().await;
        if offset == 0 {
            let writer = self.repo.open_writer(node, true).await?;
            writer.commit().await?;
            return Ok(());
        }

        let current = match self.repo.open_reader(node).await? {
            Some(reader) => reader.size(),
            None => 0,
        };
        let mut writer = self.repo.open_writer(node, false).await?;
        if offset <= current {
            writer.set_len(offset).await?;
            writer.commit().await?;
            return Ok(());
        }

        let zeros = vec![0u8; ZERO_FILL_CHUNK as usize];
        let mut written = 0u64;
        let mut position = current;
        while position < offset {
            let chunk = (offset - position).min(ZERO_FILL_CHUNK);
            written += writer.write_at(position, &zeros[..chunk as usize]).await?;
            position += chunk;
        }
        if current + written != offset {
            return Err(BridgeError::Internal(anyhow::anyhow!(
                "truncate extension wrote {written} bytes from {current}, expected end {offset}"
            )));
        }
        writer.commit().await?;
        Ok(())
    }

    /// Seeds a fresh node with an empty content stream, guessing the
    /// MIME type from its name.
    pub async fn seed(&self, node: NodeId, name: &str) -> Result<(), BridgeError> {
        let mut writer = self.repo.open_writer(node, true).await?;
        writer.set_mimetype(
            mime_guess::from_path(name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        );
        writer.set_encoding("UTF-8".to_string());
        writer.commit().await?;
        Ok(())
    }
}
