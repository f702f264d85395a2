//! Integration tests for the rename overwrite policy

mod common;

use bridge::prelude::*;
use common::BASE;

#[tokio::test]
async fn test_same_directory_rename_keeps_identity() {
    let bridge = common::bridge();
    let node = common::touch(&bridge, "/a.txt").await;

    bridge.rename(BASE, "/a.txt", "/b.txt").await.unwrap();

    let found = bridge.lookup(BASE, "/b.txt").await.unwrap();
    assert_eq!(found.uuid, node.uuid);
    let err = bridge.lookup(BASE, "/a.txt").await.unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOENT));
}

#[tokio::test]
async fn test_move_across_directories() {
    let bridge = common::bridge();
    common::mkdir(&bridge, "/src").await;
    common::mkdir(&bridge, "/dst").await;
    let node = common::touch(&bridge, "/src/a.txt").await;

    bridge.rename(BASE, "/src/a.txt", "/dst/a.txt").await.unwrap();

    let found = bridge.lookup(BASE, "/dst/a.txt").await.unwrap();
    assert_eq!(found.uuid, node.uuid);
}

#[tokio::test]
async fn test_file_overwrites_existing_file() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "source").await;
    common::touch(&bridge, "/b.txt").await;
    common::write_all(&bridge, "/b.txt", "target").await;

    bridge.rename(BASE, "/a.txt", "/b.txt").await.unwrap();

    let outcome = common::read_all(&bridge, "/b.txt").await;
    assert_eq!(&outcome.body[..], b"source");
    let err = bridge.lookup(BASE, "/a.txt").await.unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOENT));
}

#[tokio::test]
async fn test_directory_replaces_empty_directory() {
    let bridge = common::bridge();
    let source = common::mkdir(&bridge, "/src").await;
    common::touch(&bridge, "/src/a.txt").await;
    common::mkdir(&bridge, "/dst").await;

    bridge.rename(BASE, "/src", "/dst").await.unwrap();

    let found = bridge.lookup(BASE, "/dst").await.unwrap();
    assert_eq!(found.uuid, source.uuid);
    bridge.lookup(BASE, "/dst/a.txt").await.unwrap();
}

#[tokio::test]
async fn test_non_empty_target_directory_fails_and_leaves_both() {
    let bridge = common::bridge();
    common::mkdir(&bridge, "/src").await;
    common::mkdir(&bridge, "/dst").await;
    common::touch(&bridge, "/dst/keep.txt").await;

    let err = bridge.rename(BASE, "/src", "/dst").await.unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOTEMPTY));

    bridge.lookup(BASE, "/src").await.unwrap();
    bridge.lookup(BASE, "/dst/keep.txt").await.unwrap();
}

#[tokio::test]
async fn test_directory_onto_file_is_enotdir() {
    let bridge = common::bridge();
    common::mkdir(&bridge, "/src").await;
    common::touch(&bridge, "/target.txt").await;

    let err = bridge.rename(BASE, "/src", "/target.txt").await.unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOTDIR));
}

#[tokio::test]
async fn test_file_onto_directory_is_eisdir() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::mkdir(&bridge, "/dst").await;

    let err = bridge.rename(BASE, "/a.txt", "/dst").await.unwrap_err();
    assert_eq!(err.code(), Some(Errno::EISDIR));
}

#[tokio::test]
async fn test_missing_source_is_enoent() {
    let bridge = common::bridge();

    let err = bridge.rename(BASE, "/nope.txt", "/b.txt").await.unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOENT));
}

#[tokio::test]
async fn test_target_parent_is_never_auto_created() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    let err = bridge
        .rename(BASE, "/a.txt", "/missing/b.txt")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOENT));
    bridge.lookup(BASE, "/a.txt").await.unwrap();
}
