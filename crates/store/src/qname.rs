use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A qualified name: a registered namespace prefix plus a local name,
/// written `prefix:local`. Qualified names address node types, aspects
/// and properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    prefix: String,
    local: String,
}

impl QName {
    pub fn new(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            local: local.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QNameError {
    #[error("malformed qualified name: {0}")]
    Malformed(String),
    #[error("unknown namespace prefix: {0}")]
    UnknownPrefix(String),
}

/// The namespace prefix table. Resolution of a `prefix:local` string
/// fails for prefixes that were never registered.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    uris: BTreeMap<String, String>,
}

impl Namespaces {
    /// Table pre-seeded with the built-in model namespaces.
    pub fn builtin() -> Self {
        let mut ns = Self::default();
        ns.register("doc", "http://repofs.io/model/document/1.0");
        ns.register("content", "http://repofs.io/model/content/1.0");
        ns
    }

    pub fn register(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.uris.insert(prefix.into(), uri.into());
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.uris.get(prefix).map(String::as_str)
    }

    /// Resolve a `prefix:local` string against the table.
    pub fn resolve(&self, name: &str) -> Result<QName, QNameError> {
        let (prefix, local) = name
            .split_once(':')
            .ok_or_else(|| QNameError::Malformed(name.to_string()))?;
        if prefix.is_empty() || local.is_empty() {
            return Err(QNameError::Malformed(name.to_string()));
        }
        if !self.uris.contains_key(prefix) {
            return Err(QNameError::UnknownPrefix(prefix.to_string()));
        }
        Ok(QName::new(prefix, local))
    }
}
