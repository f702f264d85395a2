use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::qname::QName;
use crate::value::PropertyKind;

/// The kind of a node, derived from its type tag's subclass chain.
/// Exactly one kind per node; kind is never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "dir")]
    Directory,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "link")]
    Link,
}

// Base type tags. Every concrete node type subclasses one of the
// three kind roots below `doc:node`.
pub fn type_node() -> QName {
    QName::new("doc", "node")
}
pub fn type_folder() -> QName {
    QName::new("doc", "folder")
}
pub fn type_file() -> QName {
    QName::new("doc", "file")
}
pub fn type_link() -> QName {
    QName::new("doc", "link")
}
pub fn type_content_file() -> QName {
    QName::new("content", "file")
}
pub fn type_content_folder() -> QName {
    QName::new("content", "folder")
}

// Built-in properties.
pub fn prop_name() -> QName {
    QName::new("doc", "name")
}
pub fn prop_owner() -> QName {
    QName::new("doc", "owner")
}
pub fn prop_created() -> QName {
    QName::new("doc", "created")
}
pub fn prop_modified() -> QName {
    QName::new("doc", "modified")
}
pub fn prop_accessed() -> QName {
    QName::new("doc", "accessed")
}
pub fn prop_content() -> QName {
    QName::new("doc", "content")
}
pub fn prop_title() -> QName {
    QName::new("doc", "title")
}
pub fn prop_description() -> QName {
    QName::new("doc", "description")
}

/// Aspect whose presence enables automatic `doc:modified` tracking on
/// mutation. Suspending the tracking is the backend's job, see
/// [`Repository::suspend_audit`](crate::repo::Repository::suspend_audit).
pub fn aspect_audited() -> QName {
    QName::new("doc", "audited")
}

/// Definition of a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDef {
    pub kind: PropertyKind,
}

impl PropertyDef {
    pub fn new(kind: PropertyKind) -> Self {
        Self { kind }
    }
}

/// The property dictionary: declared property name to definition.
/// Undeclared properties cannot be set through the attribute channel.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    defs: BTreeMap<QName, PropertyDef>,
}

impl Dictionary {
    pub fn builtin() -> Self {
        let mut dict = Self::default();
        dict.define(prop_name(), PropertyKind::Text);
        dict.define(prop_owner(), PropertyKind::Text);
        dict.define(prop_title(), PropertyKind::Text);
        dict.define(prop_description(), PropertyKind::MlText);
        dict.define(prop_created(), PropertyKind::DateTime);
        dict.define(prop_modified(), PropertyKind::DateTime);
        dict.define(prop_accessed(), PropertyKind::DateTime);
        dict.define(prop_content(), PropertyKind::Content);
        dict
    }

    pub fn define(&mut self, name: QName, kind: PropertyKind) {
        self.defs.insert(name, PropertyDef::new(kind));
    }

    pub fn get(&self, name: &QName) -> Option<&PropertyDef> {
        self.defs.get(name)
    }
}

/// Type tag registry: each registered type points at its parent.
/// Kind derivation walks the parent chain to one of the kind roots.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    parents: BTreeMap<QName, QName>,
}

impl TypeRegistry {
    pub fn builtin() -> Self {
        let mut reg = Self::default();
        reg.define(type_folder(), type_node());
        reg.define(type_file(), type_node());
        reg.define(type_link(), type_node());
        reg.define(type_content_file(), type_file());
        reg.define(type_content_folder(), type_folder());
        reg
    }

    pub fn define(&mut self, type_tag: QName, parent: QName) {
        self.parents.insert(type_tag, parent);
    }

    pub fn is_known(&self, type_tag: &QName) -> bool {
        *type_tag == type_node() || self.parents.contains_key(type_tag)
    }

    /// True when `type_tag` equals `base` or transitively subclasses it.
    pub fn is_subclass(&self, type_tag: &QName, base: &QName) -> bool {
        let mut current = type_tag.clone();
        loop {
            if current == *base {
                return true;
            }
            match self.parents.get(&current) {
                Some(parent) => current = parent.clone(),
                None => return false,
            }
        }
    }

    /// Derive the node kind from the subclass chain. `None` for type
    /// tags outside all three kind roots.
    pub fn kind_of(&self, type_tag: &QName) -> Option<NodeKind> {
        if self.is_subclass(type_tag, &type_folder()) {
            Some(NodeKind::Directory)
        } else if self.is_subclass(type_tag, &type_file()) {
            Some(NodeKind::File)
        } else if self.is_subclass(type_tag, &type_link()) {
            Some(NodeKind::Link)
        } else {
            None
        }
    }
}
