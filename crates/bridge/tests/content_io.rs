//! Integration tests for ranged reads, conditional GET and truncate

mod common;

use bytes::Bytes;

use bridge::prelude::*;
use common::BASE;

#[tokio::test]
async fn test_create_write_read_truncate_roundtrip() {
    common::init_logging();
    let bridge = common::bridge();
    common::mkdir(&bridge, "/docs").await;
    common::touch(&bridge, "/docs/a.txt").await;

    let reply = common::write_all(&bridge, "/docs/a.txt", "hello").await;
    assert_eq!(reply.transferred, 5);
    assert!(!reply.etag.is_empty());

    let outcome = common::read_all(&bridge, "/docs/a.txt").await;
    assert_eq!(&outcome.body[..], b"hello");
    assert!(outcome.etag.is_some());

    bridge.truncate(BASE, "/docs/a.txt", 8).await.unwrap();
    let outcome = common::read_all(&bridge, "/docs/a.txt").await;
    assert_eq!(&outcome.body[..], b"hello\0\0\0");
}

#[tokio::test]
async fn test_truncate_to_zero_discards_content() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "some content").await;

    bridge.truncate(BASE, "/a.txt", 0).await.unwrap();
    let outcome = common::read_all(&bridge, "/a.txt").await;
    assert!(outcome.body.is_empty());

    let stat = bridge.stat(BASE, "/a.txt").await.unwrap();
    assert_eq!(stat.size, Some(0));
}

#[tokio::test]
async fn test_truncate_shrinks_in_place() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "hello world").await;

    bridge.truncate(BASE, "/a.txt", 5).await.unwrap();
    let outcome = common::read_all(&bridge, "/a.txt").await;
    assert_eq!(&outcome.body[..], b"hello");
}

#[tokio::test]
async fn test_truncate_grow_zero_fills_past_chunk_boundary() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "x").await;

    // crosses two zero-fill chunks
    bridge.truncate(BASE, "/a.txt", 10_000).await.unwrap();
    let outcome = common::read_all(&bridge, "/a.txt").await;
    assert_eq!(outcome.body.len(), 10_000);
    assert_eq!(outcome.body[0], b'x');
    assert!(outcome.body[1..].iter().all(|b| *b == 0));
}

#[tokio::test]
async fn test_ranged_read_has_no_etag() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "hello world").await;

    let outcome = bridge
        .read(&ReadRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            offset: Some(6),
            size: Some(100),
            if_none_match: None,
        })
        .await
        .unwrap();
    assert_eq!(&outcome.body[..], b"world");
    assert!(outcome.etag.is_none());
}

#[tokio::test]
async fn test_conditional_read_matches_and_goes_stale() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    let reply = common::write_all(&bridge, "/a.txt", "hello").await;

    let outcome = bridge
        .read(&ReadRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            if_none_match: Some(format!("\"{}\"", reply.etag)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(outcome.not_modified);
    assert!(outcome.body.is_empty());

    // rewriting even identical bytes may move the content address
    let fresh = common::write_all(&bridge, "/a.txt", "hello").await;
    assert_ne!(fresh.etag, reply.etag);

    let outcome = bridge
        .read(&ReadRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            if_none_match: Some(reply.etag),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!outcome.not_modified);
    assert_eq!(&outcome.body[..], b"hello");
}

#[tokio::test]
async fn test_directory_read_yields_empty_body() {
    let bridge = common::bridge();
    common::mkdir(&bridge, "/docs").await;

    let outcome = common::read_all(&bridge, "/docs").await;
    assert!(outcome.body.is_empty());
    assert!(outcome.etag.is_none());
}

#[tokio::test]
async fn test_write_at_offset_preserves_prefix() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "hello").await;

    let reply = bridge
        .write(
            &WriteRequest {
                base: BASE.to_string(),
                path: "/a.txt".to_string(),
                offset: 5,
                size: 6,
                truncate: false,
                mtime: None,
            },
            Bytes::from_static(b" world"),
        )
        .await
        .unwrap();
    assert_eq!(reply.transferred, 6);

    let outcome = common::read_all(&bridge, "/a.txt").await;
    assert_eq!(&outcome.body[..], b"hello world");
}

#[tokio::test]
async fn test_write_mtime_override_sticks() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    bridge
        .write(
            &WriteRequest {
                base: BASE.to_string(),
                path: "/a.txt".to_string(),
                offset: 0,
                size: 5,
                truncate: true,
                mtime: Some(1_000_000),
            },
            Bytes::from_static(b"hello"),
        )
        .await
        .unwrap();

    let stat = bridge.stat(BASE, "/a.txt").await.unwrap();
    assert_eq!(stat.mtime_sec, Some(1_000_000));
}

#[tokio::test]
async fn test_size_mismatch_is_rejected_before_backend_call() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    let err = bridge
        .write(
            &WriteRequest {
                base: BASE.to_string(),
                path: "/a.txt".to_string(),
                offset: 0,
                size: 99,
                truncate: true,
                mtime: None,
            },
            Bytes::from_static(b"hello"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::EIO));
}
