//! Shared test utilities for bridge integration tests
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;

use bridge::prelude::*;
use store::prelude::MemoryRepository;

pub const BASE: &str = SUPPORTED_BASE;

/// Opt into log output for a test run via `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Build a bridge over a fresh in-memory repository.
pub fn bridge() -> Bridge {
    bridge_with(|_| {})
}

/// Build a bridge, letting the test tweak the repository (extra
/// dictionary entries, namespaces) before it is shared.
pub fn bridge_with(tweak: impl FnOnce(&mut MemoryRepository)) -> Bridge {
    let mut repo = MemoryRepository::new();
    tweak(&mut repo);
    Bridge::new(Arc::new(repo))
}

pub async fn mkdir(bridge: &Bridge, path: &str) -> NodeRef {
    bridge
        .create(&CreateRequest {
            base: BASE.to_string(),
            path: path.to_string(),
            type_tag: "content:folder".to_string(),
            flags: None,
        })
        .await
        .unwrap()
}

pub async fn touch(bridge: &Bridge, path: &str) -> NodeRef {
    bridge
        .create(&CreateRequest {
            base: BASE.to_string(),
            path: path.to_string(),
            type_tag: "content:file".to_string(),
            flags: None,
        })
        .await
        .unwrap()
}

pub async fn write_all(bridge: &Bridge, path: &str, body: &str) -> WriteReply {
    bridge
        .write(
            &WriteRequest {
                base: BASE.to_string(),
                path: path.to_string(),
                offset: 0,
                size: body.len() as u64,
                truncate: true,
                mtime: None,
            },
            Bytes::from(body.to_string()),
        )
        .await
        .unwrap()
}

pub async fn read_all(bridge: &Bridge, path: &str) -> ReadOutcome {
    bridge
        .read(&ReadRequest {
            base: BASE.to_string(),
            path: path.to_string(),
            offset: None,
            size: None,
            if_none_match: None,
        })
        .await
        .unwrap()
}

pub async fn set_attr(bridge: &Bridge, path: &str, key: &str, value: &str) {
    bridge
        .setxattr(&SetXattrRequest {
            base: BASE.to_string(),
            path: path.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            mode: XattrMode::CreateOrReplace,
        })
        .await
        .unwrap()
}

pub async fn get_attr(bridge: &Bridge, path: &str, key: &str) -> Option<String> {
    let reply = bridge
        .getxattr(&GetXattrRequest {
            base: BASE.to_string(),
            path: path.to_string(),
            key: Some(key.to_string()),
            mode: None,
        })
        .await
        .unwrap();
    match reply {
        XattrReply::Value { value, .. } => value,
        other => panic!("expected single value, got {other:?}"),
    }
}
