//! Integration tests for the flat attribute namespace

mod common;

use bridge::prelude::*;
use common::BASE;
use store::prelude::{PropertyKind, QName};

fn scalar_bridge() -> Bridge {
    common::bridge_with(|repo| {
        repo.define_property(QName::new("doc", "flag"), PropertyKind::Bool);
        repo.define_property(QName::new("doc", "rating"), PropertyKind::Int);
        repo.define_property(QName::new("doc", "revision"), PropertyKind::Long);
        repo.define_property(QName::new("doc", "weight"), PropertyKind::Float);
        repo.define_property(QName::new("doc", "score"), PropertyKind::Double);
        repo.define_property(QName::new("doc", "due"), PropertyKind::Date);
        repo.define_property(QName::new("doc", "language"), PropertyKind::Locale);
        repo.define_property(QName::new("doc", "category"), PropertyKind::QName);
    })
}

#[tokio::test]
async fn test_scalar_roundtrips() {
    let bridge = scalar_bridge();
    common::touch(&bridge, "/a.txt").await;

    let cases = [
        ("repo.prop.doc:title", "quarterly report"),
        ("repo.prop.doc:flag", "true"),
        ("repo.prop.doc:rating", "4"),
        ("repo.prop.doc:revision", "9000000000"),
        ("repo.prop.doc:weight", "2.5"),
        ("repo.prop.doc:score", "0.125"),
        ("repo.prop.doc:due", "2024-03-07"),
        ("repo.prop.doc:modified", "2024-03-07T09:30:00"),
        ("repo.prop.doc:language", "en_GB"),
        ("repo.prop.doc:category", "doc:file"),
    ];
    for (key, value) in cases {
        common::set_attr(&bridge, "/a.txt", key, value).await;
        assert_eq!(
            common::get_attr(&bridge, "/a.txt", key).await.as_deref(),
            Some(value),
            "round-trip failed for {key}"
        );
    }
}

#[tokio::test]
async fn test_mltext_accepts_plain_text() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    common::set_attr(&bridge, "/a.txt", "repo.prop.doc:description", "summary").await;
    assert_eq!(
        common::get_attr(&bridge, "/a.txt", "repo.prop.doc:description")
            .await
            .as_deref(),
        Some("summary")
    );
}

#[tokio::test]
async fn test_create_mode_rejects_existing() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::set_attr(&bridge, "/a.txt", "repo.prop.doc:title", "first").await;

    let err = bridge
        .setxattr(&SetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: "repo.prop.doc:title".to_string(),
            value: "second".to_string(),
            mode: XattrMode::Create,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::EEXIST));
}

#[tokio::test]
async fn test_replace_mode_requires_existing() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    let err = bridge
        .setxattr(&SetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: "repo.prop.doc:title".to_string(),
            value: "anything".to_string(),
            mode: XattrMode::Replace,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOATTR));
}

#[tokio::test]
async fn test_malformed_typed_value_is_eio() {
    let bridge = scalar_bridge();
    common::touch(&bridge, "/a.txt").await;

    let err = bridge
        .setxattr(&SetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: "repo.prop.doc:rating".to_string(),
            value: "not-a-number".to_string(),
            mode: XattrMode::CreateOrReplace,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::EIO));
}

#[tokio::test]
async fn test_undeclared_property_is_enotsup() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    let err = bridge
        .setxattr(&SetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: "repo.prop.doc:nonsense".to_string(),
            value: "v".to_string(),
            mode: XattrMode::CreateOrReplace,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOTSUP));
}

#[tokio::test]
async fn test_listing_expands_content_into_detail_keys() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "hello").await;

    let reply = bridge
        .getxattr(&GetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: None,
            mode: None,
        })
        .await
        .unwrap();
    let map = match reply {
        XattrReply::Map(map) => map,
        other => panic!("expected full map, got {other:?}"),
    };

    // the payload never appears, only its five metadata sub-keys
    assert!(!map.contains_key("repo.prop.doc:content"));
    for detail in ["encoding", "mimetype", "locale", "size", "location"] {
        assert!(
            map.contains_key(&format!("repo.prop.doc:content.{detail}")),
            "missing detail key {detail}"
        );
    }
    assert_eq!(
        map.get("repo.prop.doc:content.size").unwrap().as_deref(),
        Some("5")
    );
    assert_eq!(
        map.get("repo.prop.doc:content.mimetype").unwrap().as_deref(),
        Some("text/plain")
    );
    assert!(map.contains_key("repo.nodeId"));
    assert!(map.contains_key("repo.type"));
    assert!(map.contains_key("repo.aspects"));
}

#[tokio::test]
async fn test_content_without_detail_is_enotsup() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "hello").await;

    let err = bridge
        .getxattr(&GetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: Some("repo.prop.doc:content".to_string()),
            mode: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOTSUP));
}

#[tokio::test]
async fn test_absent_attribute_is_enoattr() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    let err = bridge
        .getxattr(&GetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: Some("repo.prop.doc:title".to_string()),
            mode: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOATTR));
}

#[tokio::test]
async fn test_onlykeys_mode_lists_keys() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    let reply = bridge
        .getxattr(&GetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: None,
            mode: Some(GetXattrMode::OnlyKeys),
        })
        .await
        .unwrap();
    let keys = match reply {
        XattrReply::Keys(keys) => keys,
        other => panic!("expected key list, got {other:?}"),
    };
    assert!(keys.contains(&"repo.nodeId".to_string()));
    assert!(keys.contains(&"repo.prop.doc:name".to_string()));
}

#[tokio::test]
async fn test_aspect_replace_is_symmetric() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    common::set_attr(&bridge, "/a.txt", "repo.aspects", "doc:audited,content:tagged").await;
    let aspects = common::get_attr(&bridge, "/a.txt", "repo.aspects")
        .await
        .unwrap();
    assert_eq!(aspects, "content:tagged,doc:audited");

    // replacing drops what is absent from the new set
    common::set_attr(&bridge, "/a.txt", "repo.aspects", "content:tagged").await;
    let aspects = common::get_attr(&bridge, "/a.txt", "repo.aspects")
        .await
        .unwrap();
    assert_eq!(aspects, "content:tagged");
}

#[tokio::test]
async fn test_remove_returns_previous_value() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::set_attr(&bridge, "/a.txt", "repo.prop.doc:title", "v1").await;

    let reply = bridge
        .removexattr(BASE, "/a.txt", "repo.prop.doc:title")
        .await
        .unwrap();
    assert_eq!(reply.previous.as_deref(), Some("v1"));

    let err = bridge
        .removexattr(BASE, "/a.txt", "repo.prop.doc:title")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOENT));
}

#[tokio::test]
async fn test_detail_keys_are_not_removable() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "hello").await;

    let err = bridge
        .removexattr(BASE, "/a.txt", "repo.prop.doc:content.mimetype")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOTSUP));
}

#[tokio::test]
async fn test_content_mimetype_detail_is_writable() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;
    common::write_all(&bridge, "/a.txt", "hello").await;

    common::set_attr(
        &bridge,
        "/a.txt",
        "repo.prop.doc:content.mimetype",
        "application/x-custom",
    )
    .await;
    assert_eq!(
        common::get_attr(&bridge, "/a.txt", "repo.prop.doc:content.mimetype")
            .await
            .as_deref(),
        Some("application/x-custom")
    );

    let err = bridge
        .setxattr(&SetXattrRequest {
            base: BASE.to_string(),
            path: "/a.txt".to_string(),
            key: "repo.prop.doc:content.size".to_string(),
            value: "12".to_string(),
            mode: XattrMode::CreateOrReplace,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Errno::ENOTSUP));
}

#[tokio::test]
async fn test_structural_type_is_settable() {
    let bridge = common::bridge();
    common::touch(&bridge, "/a.txt").await;

    assert_eq!(
        common::get_attr(&bridge, "/a.txt", "repo.type")
            .await
            .as_deref(),
        Some("content:file")
    );
    common::set_attr(&bridge, "/a.txt", "repo.type", "doc:file").await;
    assert_eq!(
        common::get_attr(&bridge, "/a.txt", "repo.type")
            .await
            .as_deref(),
        Some("doc:file")
    );
}
