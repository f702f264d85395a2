use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use store::prelude::{
    Locale, NodeId, PropertyKind, QName, Repository, StoreError, TypedValue,
};

use crate::error::BridgeError;

pub const KEY_NODE_ID: &str = "repo.nodeId";
pub const KEY_ASPECTS: &str = "repo.aspects";
pub const KEY_TYPE: &str = "repo.type";
const PROP_PREFIX: &str = "repo.prop.";

/// Date-time wire form: ISO-8601 UTC, second granularity.
pub(crate) const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";
pub(crate) const ISO_DATE: &str = "%Y-%m-%d";

/// Sub-field selector for content-descriptor properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDetail {
    Encoding,
    Mimetype,
    Locale,
    Size,
    Location,
}

impl ContentDetail {
    fn parse(suffix: &str) -> Option<Self> {
        match suffix {
            "encoding" => Some(Self::Encoding),
            "mimetype" => Some(Self::Mimetype),
            "locale" => Some(Self::Locale),
            "size" => Some(Self::Size),
            "location" => Some(Self::Location),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Encoding => "encoding",
            Self::Mimetype => "mimetype",
            Self::Locale => "locale",
            Self::Size => "size",
            Self::Location => "location",
        }
    }
}

/// Parsed attribute key. The grammar is `repo.prop.<qname>[.<detail>]`
/// plus the three reserved structural keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKey {
    NodeId,
    Aspects,
    Type,
    Prop {
        name: QName,
        detail: Option<ContentDetail>,
    },
}

#[derive(Debug)]
enum KeyError {
    /// Key does not match the grammar at all.
    Unrecognized,
    /// Matched a property key but the detail suffix is unknown.
    UnknownDetail(String),
}

impl AttrKey {
    fn parse(key: &str, repo: &dyn Repository) -> Result<Self, KeyError> {
        match key {
            KEY_NODE_ID => return Ok(Self::NodeId),
            KEY_ASPECTS => return Ok(Self::Aspects),
            KEY_TYPE => return Ok(Self::Type),
            _ => {}
        }
        let rest = key.strip_prefix(PROP_PREFIX).ok_or(KeyError::Unrecognized)?;
        let (qname_part, detail) = match rest.split_once('.') {
            Some((qname_part, suffix)) => {
                let detail =
                    ContentDetail::parse(suffix).ok_or_else(|| KeyError::UnknownDetail(suffix.to_string()))?;
                (qname_part, Some(detail))
            }
            None => (rest, None),
        };
        let name = repo
            .namespaces()
            .resolve(qname_part)
            .map_err(|_| KeyError::Unrecognized)?;
        Ok(Self::Prop { name, detail })
    }
}

/// Conflict policy for setxattr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XattrMode {
    /// Fail with EEXIST if the attribute already exists.
    Create,
    /// Fail with ENOATTR if the attribute is absent.
    Replace,
    #[default]
    #[serde(rename = "createorreplace")]
    CreateOrReplace,
}

/// Bidirectional mapping between typed node properties and the flat
/// string-keyed attribute namespace.
#[derive(Clone)]
pub struct AttributeCodec {
    repo: Arc<dyn Repository>,
}

impl AttributeCodec {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    fn prop_key(name: &QName) -> String {
        format!("{PROP_PREFIX}{name}")
    }

    fn detail_key(name: &QName, detail: ContentDetail) -> String {
        format!("{PROP_PREFIX}{name}.{}", detail.suffix())
    }

    /// Marshals every property of the node. Content descriptors expand
    /// into their five detail keys; the payload itself never appears.
    pub async fn marshal_all(
        &self,
        node: NodeId,
    ) -> Result<BTreeMap<String, Option<String>>, BridgeError> {
        let props = self.repo.properties(node).await?;
        let aspects = self.repo.aspects(node).await?;
        let type_tag = self.repo.node_type(node).await?;

        let mut out = BTreeMap::new();
        for (name, value) in &props {
            match value {
                TypedValue::Content(cdata) => {
                    out.insert(
                        Self::detail_key(name, ContentDetail::Encoding),
                        cdata.encoding.clone(),
                    );
                    out.insert(
                        Self::detail_key(name, ContentDetail::Mimetype),
                        cdata.mimetype.clone(),
                    );
                    out.insert(
                        Self::detail_key(name, ContentDetail::Locale),
                        cdata.locale.as_ref().map(|l| l.to_string()),
                    );
                    out.insert(
                        Self::detail_key(name, ContentDetail::Size),
                        Some(cdata.size.to_string()),
                    );
                    out.insert(
                        Self::detail_key(name, ContentDetail::Location),
                        Some(cdata.location.clone()),
                    );
                }
                other => {
                    out.insert(Self::prop_key(name), scalar_string(other));
                }
            }
        }
        out.insert(
            KEY_ASPECTS.to_string(),
            Some(join_qnames(aspects.iter())),
        );
        out.insert(KEY_TYPE.to_string(), Some(type_tag.to_string()));
        out.insert(KEY_NODE_ID.to_string(), Some(node.to_string()));
        Ok(out)
    }

    /// Marshals a single attribute by key.
    pub async fn marshal_one(
        &self,
        node: NodeId,
        key: &str,
    ) -> Result<Option<String>, BridgeError> {
        let parsed = AttrKey::parse(key, self.repo.as_ref()).map_err(|err| match err {
            KeyError::UnknownDetail(suffix) => {
                BridgeError::not_supported(format!("unknown attribute detail: {suffix}"))
            }
            KeyError::Unrecognized => BridgeError::no_attr(format!("no such attribute: {key}")),
        })?;
        match parsed {
            AttrKey::NodeId => Ok(Some(node.to_string())),
            AttrKey::Type => Ok(Some(self.repo.node_type(node).await?.to_string())),
            AttrKey::Aspects => {
                let aspects = self.repo.aspects(node).await?;
                Ok(Some(join_qnames(aspects.iter())))
            }
            AttrKey::Prop { name, detail } => {
                let props = self.repo.properties(node).await?;
                let value = props
                    .get(&name)
                    .ok_or_else(|| BridgeError::no_attr(format!("attribute absent: {key}")))?;
                match (value, detail) {
                    (TypedValue::Content(cdata), Some(detail)) => Ok(match detail {
                        ContentDetail::Encoding => cdata.encoding.clone(),
                        ContentDetail::Mimetype => cdata.mimetype.clone(),
                        ContentDetail::Locale => cdata.locale.as_ref().map(|l| l.to_string()),
                        ContentDetail::Size => Some(cdata.size.to_string()),
                        ContentDetail::Location => Some(cdata.location.clone()),
                    }),
                    (TypedValue::Content(_), None) => Err(BridgeError::not_supported(
                        "content payload is not readable through the attribute channel",
                    )),
                    (_, Some(_)) => Err(BridgeError::not_supported(format!(
                        "detail selector on non-content attribute: {key}"
                    ))),
                    (other, None) => Ok(scalar_string(other)),
                }
            }
        }
    }

    /// Lists every attribute key without marshalling the values.
    pub async fn keys(&self, node: NodeId) -> Result<Vec<String>, BridgeError> {
        Ok(self.marshal_all(node).await?.into_keys().collect())
    }

    /// Coerces and stores a raw attribute value.
    pub async fn unmarshal(
        &self,
        node: NodeId,
        key: &str,
        raw: &str,
        mode: XattrMode,
    ) -> Result<(), BridgeError> {
        let parsed = AttrKey::parse(key, self.repo.as_ref())
            .map_err(|_| BridgeError::not_supported(format!("unsupported attribute: {key}")))?;
        let _txn = self.repo.begin().await;
        match parsed {
            AttrKey::NodeId => Err(BridgeError::not_supported("repo.nodeId is read-only")),
            AttrKey::Type => {
                let type_tag = self
                    .repo
                    .namespaces()
                    .resolve(raw)
                    .map_err(|e| BridgeError::bad_input(e.to_string()))?;
                self.repo.set_node_type(node, type_tag).await.map_err(|err| {
                    match err {
                        StoreError::UnknownType(t) => {
                            BridgeError::not_supported(format!("unknown node type: {t}"))
                        }
                        other => other.into(),
                    }
                })
            }
            AttrKey::Aspects => self.set_aspects(node, raw, mode).await,
            AttrKey::Prop {
                name,
                detail: Some(detail),
            } => self.set_content_detail(node, &name, detail, raw).await,
            AttrKey::Prop { name, detail: None } => {
                self.set_scalar(node, &name, raw, mode).await
            }
        }
    }

    /// Removes a whole property and returns its previous marshalled
    /// value. Structural and detail keys are not removable.
    pub async fn remove(
        &self,
        node: NodeId,
        key: &str,
    ) -> Result<Option<String>, BridgeError> {
        let parsed = AttrKey::parse(key, self.repo.as_ref())
            .map_err(|_| BridgeError::not_supported(format!("unsupported attribute: {key}")))?;
        let name = match parsed {
            AttrKey::Prop { name, detail: None } => name,
            AttrKey::Prop { detail: Some(_), .. } => {
                return Err(BridgeError::not_supported(
                    "content detail sub-keys are not removable",
                ))
            }
            _ => {
                return Err(BridgeError::not_supported(format!(
                    "structural attribute is not removable: {key}"
                )))
            }
        };
        let props = self.repo.properties(node).await?;
        let previous = props
            .get(&name)
            .ok_or_else(|| BridgeError::not_found(format!("attribute absent: {key}")))?;
        let previous = scalar_string(previous);
        let _txn = self.repo.begin().await;
        self.repo.remove_property(node, &name).await?;
        Ok(previous)
    }

    async fn set_aspects(
        &self,
        node: NodeId,
        raw: &str,
        mode: XattrMode,
    ) -> Result<(), BridgeError> {
        let mut wanted = BTreeSet::new();
        for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let aspect = self
                .repo
                .namespaces()
                .resolve(part)
                .map_err(|e| BridgeError::bad_input(e.to_string()))?;
            wanted.insert(aspect);
        }
        match mode {
            XattrMode::Create => {
                for aspect in wanted {
                    self.repo.add_aspect(node, aspect).await?;
                }
            }
            XattrMode::Replace | XattrMode::CreateOrReplace => {
                let current = self.repo.aspects(node).await?;
                for aspect in wanted.difference(&current) {
                    self.repo.add_aspect(node, aspect.clone()).await?;
                }
                for aspect in current.difference(&wanted) {
                    self.repo.remove_aspect(node, aspect).await?;
                }
            }
        }
        Ok(())
    }

    async fn set_content_detail(
        &self,
        node: NodeId,
        name: &QName,
        detail: ContentDetail,
        raw: &str,
    ) -> Result<(), BridgeError> {
        match detail {
            ContentDetail::Encoding | ContentDetail::Mimetype => {}
            other => {
                return Err(BridgeError::not_supported(format!(
                    "content detail is not writable: {}",
                    other.suffix()
                )))
            }
        }
        let props = self.repo.properties(node).await?;
        let mut cdata = match props.get(name) {
            Some(TypedValue::Content(cdata)) => cdata.clone(),
            // no content stream yet: nothing to annotate
            _ => {
                debug!(%node, %name, "content detail set on absent descriptor, skipping");
                return Ok(());
            }
        };
        match detail {
            ContentDetail::Encoding => cdata.encoding = Some(raw.to_string()),
            ContentDetail::Mimetype => cdata.mimetype = Some(raw.to_string()),
            _ => unreachable!(),
        }
        self.repo
            .set_property(node, name.clone(), TypedValue::Content(cdata))
            .await?;
        Ok(())
    }

    async fn set_scalar(
        &self,
        node: NodeId,
        name: &QName,
        raw: &str,
        mode: XattrMode,
    ) -> Result<(), BridgeError> {
        let kind = self
            .repo
            .dictionary()
            .get(name)
            .map(|def| def.kind)
            .ok_or_else(|| BridgeError::not_supported(format!("undeclared property: {name}")))?;
        let exists = self.repo.properties(node).await?.contains_key(name);
        match mode {
            XattrMode::Create if exists => {
                return Err(BridgeError::errno(
                    crate::error::Errno::EEXIST,
                    format!("attribute already exists: {name}"),
                ))
            }
            XattrMode::Replace if !exists => {
                return Err(BridgeError::no_attr(format!("attribute absent: {name}")))
            }
            _ => {}
        }
        let value = coerce(kind, raw, self.repo.as_ref())?;

        // A caller writing doc:modified expects the value to stick, so
        // tracking must not clobber it in the same call.
        let pause = if *name == store::model::prop_modified() {
            Some(self.repo.suspend_audit(node))
        } else {
            None
        };
        let result = self.repo.set_property(node, name.clone(), value).await;
        drop(pause);
        Ok(result?)
    }
}

/// Serializes a scalar or collection value to its wire string.
/// Content descriptors have no scalar form.
pub(crate) fn scalar_string(value: &TypedValue) -> Option<String> {
    match value {
        TypedValue::Text(s) => Some(s.clone()),
        TypedValue::MlText(map) => map.values().next().cloned(),
        TypedValue::Bool(b) => Some(b.to_string()),
        TypedValue::Int(i) => Some(i.to_string()),
        TypedValue::Long(i) => Some(i.to_string()),
        TypedValue::Float(f) => Some(f.to_string()),
        TypedValue::Double(f) => Some(f.to_string()),
        TypedValue::Date(d) => Some(d.format(ISO_DATE).to_string()),
        TypedValue::DateTime(dt) => Some(dt.format(ISO_DATETIME).to_string()),
        TypedValue::Locale(l) => Some(l.to_string()),
        TypedValue::QName(q) => Some(q.to_string()),
        TypedValue::Content(_) => None,
        TypedValue::List(items) => Some(
            items
                .iter()
                .filter_map(scalar_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
    }
}

fn join_qnames<'a>(iter: impl Iterator<Item = &'a QName>) -> String {
    iter.map(|q| q.to_string()).collect::<Vec<_>>().join(",")
}

/// Parses a raw attribute value against the property's declared kind.
fn coerce(kind: PropertyKind, raw: &str, repo: &dyn Repository) -> Result<TypedValue, BridgeError> {
    let bad = |what: &str| BridgeError::bad_input(format!("malformed {what} value: {raw:?}"));
    match kind {
        PropertyKind::Text => Ok(TypedValue::Text(raw.to_string())),
        PropertyKind::MlText => {
            let mut map = BTreeMap::new();
            map.insert(Locale::new("en"), raw.to_string());
            Ok(TypedValue::MlText(map))
        }
        PropertyKind::Bool => match raw {
            "true" => Ok(TypedValue::Bool(true)),
            "false" => Ok(TypedValue::Bool(false)),
            _ => Err(bad("boolean")),
        },
        PropertyKind::Int => raw.parse().map(TypedValue::Int).map_err(|_| bad("integer")),
        PropertyKind::Long => raw.parse().map(TypedValue::Long).map_err(|_| bad("long")),
        PropertyKind::Float => raw.parse().map(TypedValue::Float).map_err(|_| bad("float")),
        PropertyKind::Double => raw
            .parse()
            .map(TypedValue::Double)
            .map_err(|_| bad("double")),
        PropertyKind::Date => NaiveDate::parse_from_str(raw, ISO_DATE)
            .map(TypedValue::Date)
            .map_err(|_| bad("date")),
        PropertyKind::DateTime => NaiveDateTime::parse_from_str(raw, ISO_DATETIME)
            .map(|dt| TypedValue::DateTime(dt.and_utc()))
            .map_err(|_| bad("date-time")),
        PropertyKind::Locale => raw
            .parse()
            .map(TypedValue::Locale)
            .map_err(|_| bad("locale")),
        PropertyKind::QName => repo
            .namespaces()
            .resolve(raw)
            .map(TypedValue::QName)
            .map_err(|_| bad("qualified-name")),
        PropertyKind::Content => Err(BridgeError::not_supported(
            "content descriptors cannot be set through the attribute channel",
        )),
    }
}
