/**
 * Errno taxonomy and the machine-readable error
 *  payload every failed operation answers with.
 */
pub mod error;
/**
 * Path resolution: `(base, path)` to node identifier,
 *  with the process-wide cached root handle.
 */
pub mod resolve;
/**
 * The attribute codec: typed node properties, aspects
 *  and type tags marshalled to and from the flat
 *  `repo.*` string-keyed attribute namespace.
 */
pub mod xattr;
/**
 * Ranged content read/write: ETag derivation,
 *  conditional GET, and truncate with chunked
 *  zero-fill extension.
 */
pub mod content;
/**
 * Rename overwrite policy and its directory
 *  emptiness checks.
 */
pub mod rename;
/**
 * POSIX stat record and filesystem capacity assembly.
 */
pub mod stat;
/**
 * The operation surface: request/response types and
 *  the `Bridge` facade serving every filesystem
 *  operation.
 */
pub mod ops;

pub mod prelude {
    pub use crate::content::{ContentIo, ReadOutcome, WriteOutcome};
    pub use crate::error::{BridgeError, Errno, ErrorPayload};
    pub use crate::ops::{
        Bridge, BridgeConfig, CreateRequest, GetXattrRequest, GetXattrMode, NodeRef,
        ReadRequest, ReaddirReply, RemoveXattrReply, SetXattrRequest, UtimensReply,
        UtimensRequest, WriteReply, WriteRequest, XattrReply,
    };
    pub use crate::rename::RenameCoordinator;
    pub use crate::resolve::{PathResolver, SUPPORTED_BASE};
    pub use crate::stat::{StatBuilder, StatFs, StatRecord};
    pub use crate::xattr::{AttributeCodec, ContentDetail, XattrMode};
}
