//! Metadata model: collections and their secondary indexes.
//!
//! Pure data with derived naming. The physical layout derived from these
//! definitions lives in [`crate::encoding`].

mod collection;
mod index;

pub use collection::{AttributeConstraint, AttributeDefinition, AttributeType, Collection};
pub use index::{Index, IndexConfiguration, NAME_SEPARATOR, ORDER_BY_MARKER};

/// Collection holding collection definitions.
pub const COLLECTION_COLLECTION: &str = "collection";

/// Collection holding index definitions.
pub const INDEX_COLLECTION: &str = "index";

/// Reserved metadata collections. Their documents are never indexed.
pub const SYSTEM_COLLECTIONS: [&str; 5] = [
    COLLECTION_COLLECTION,
    INDEX_COLLECTION,
    "client_authorization",
    "aggregation_configuration",
    "aggregation",
];

/// Returns true if `name` is a reserved metadata collection.
#[must_use]
pub fn is_system_collection(name: &str) -> bool {
    SYSTEM_COLLECTIONS.contains(&name)
}
