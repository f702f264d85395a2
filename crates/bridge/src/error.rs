use serde::{Deserialize, Serialize};
use store::prelude::StoreError;

/// POSIX errno codes surfaced to filesystem clients. The string form
/// is stable: clients translate it directly to a kernel errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Errno {
    /// Malformed or missing required input.
    EIO,
    /// Path or attribute not found.
    ENOENT,
    /// Operation or type not implemented.
    ENOTSUP,
    /// Attribute absent on get/remove.
    ENOATTR,
    /// Target already exists.
    EEXIST,
    /// Non-empty directory on delete or overwrite.
    ENOTEMPTY,
    /// Expected a directory, got something else.
    ENOTDIR,
    /// Expected a non-directory, got a directory.
    EISDIR,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{message}")]
    Errno { errno: Errno, message: String },

    /// Only one base is supported; anything else is a deployment
    /// problem, not a request error.
    #[error("unsupported base: {0}")]
    UnsupportedBase(String),

    /// Backend failure that no call site classified. Not retried here.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BridgeError {
    pub fn errno(errno: Errno, message: impl Into<String>) -> Self {
        Self::Errno {
            errno,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::errno(Errno::ENOENT, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::errno(Errno::ENOTSUP, message)
    }

    pub fn no_attr(message: impl Into<String>) -> Self {
        Self::errno(Errno::ENOATTR, message)
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::errno(Errno::EIO, message)
    }

    pub fn code(&self) -> Option<Errno> {
        match self {
            Self::Errno { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

/// Machine-readable error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<Errno>,
}

impl From<&BridgeError> for ErrorPayload {
    fn from(err: &BridgeError) -> Self {
        Self {
            message: err.to_string(),
            errno: err.code(),
        }
    }
}
