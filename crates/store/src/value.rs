use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};

use crate::qname::QName;

/// A locale tag: `language[_country[_variant]]`, one to three
/// underscore-delimited components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale {
    language: String,
    country: Option<String>,
    variant: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid locale: {0}")]
pub struct LocaleError(String);

impl Locale {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            country: None,
            variant: None,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(LocaleError(s.to_string()));
        }
        Ok(Self {
            language: parts[0].to_string(),
            country: parts.get(1).map(|p| p.to_string()),
            variant: parts.get(2).map(|p| p.to_string()),
        })
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.language)?;
        if let Some(country) = &self.country {
            write!(f, "_{}", country)?;
        }
        if let Some(variant) = &self.variant {
            write!(f, "_{}", variant)?;
        }
        Ok(())
    }
}

/// Descriptor for a node's binary content stream. The `location` token
/// is an opaque content-address-derived reference allocated by the
/// backend on every committed write; identical bytes under the same
/// store produce a stable token, which is what makes it usable as an
/// ETag source.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentData {
    pub encoding: Option<String>,
    pub mimetype: Option<String>,
    pub locale: Option<Locale>,
    pub size: u64,
    pub location: String,
}

/// Declared data types for dictionary entries. The codec coerces raw
/// attribute bytes against the declared kind, one arm per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    MlText,
    Bool,
    Int,
    Long,
    Float,
    Double,
    Date,
    DateTime,
    Locale,
    QName,
    Content,
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    MlText(BTreeMap<Locale, String>),
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Locale(Locale),
    QName(QName),
    Content(ContentData),
    List(Vec<TypedValue>),
}

impl TypedValue {
    pub fn as_content(&self) -> Option<&ContentData> {
        match self {
            TypedValue::Content(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            TypedValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(t) => Some(t),
            _ => None,
        }
    }
}
