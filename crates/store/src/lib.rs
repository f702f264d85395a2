/**
 * Qualified names and the namespace prefix table.
 *  Every property, aspect and type tag in the store
 *  is addressed by a `prefix:local` qualified name.
 */
pub mod qname;
/**
 * Typed property values: the closed union of value
 *  kinds a node property can carry, plus the content
 *  descriptor and locale types.
 */
pub mod value;
/**
 * The built-in content model: base node types with
 *  their subclass chains, the property dictionary,
 *  and kind derivation (directory / file / link).
 */
pub mod model;
/**
 * The backend repository interface consumed by the
 *  translation layer, together with the content
 *  stream handle traits and scope guards.
 */
pub mod repo;
/**
 * In-memory repository implementation. Backs the
 *  test suite and small deployments; allocates a
 *  fresh content location token on every committed
 *  write (copy-on-write).
 */
pub mod memory;

pub mod prelude {
    pub use crate::memory::MemoryRepository;
    pub use crate::model::{Dictionary, NodeKind, PropertyDef, TypeRegistry};
    pub use crate::qname::{Namespaces, QName};
    pub use crate::repo::{NodeId, Repository, StoreError};
    pub use crate::value::{ContentData, Locale, PropertyKind, TypedValue};
}
