//! Metadata registries.
//!
//! A registry owns collection and index definitions and is handed to the
//! [`crate::Database`] explicitly. Two implementations exist:
//!
//! - [`InMemoryRegistry`] keeps definitions in process memory
//! - [`TableRegistry`] keeps them as documents of the `collection` and
//!   `index` system collections in the record store itself

mod memory;
mod table;

pub use memory::InMemoryRegistry;
pub use table::TableRegistry;

use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Index};

/// Source of collection and index definitions.
pub trait MetadataRegistry: Send + Sync {
    /// Looks up a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn get_collection(&self, name: &str) -> CoreResult<Option<Collection>>;

    /// Lists the indexes of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn list_indexes(&self, collection_name: &str) -> CoreResult<Vec<Index>>;

    /// Registers a collection and returns the stored definition.
    ///
    /// Registering an identical definition again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an invalid or conflicting definition.
    fn register_collection(&self, collection: Collection) -> CoreResult<Collection>;

    /// Registers an index and returns the stored definition.
    ///
    /// An index with the same name as an existing one is the existing one.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` if the collection is unknown, or
    /// `Validation` for an invalid definition or one that shares its
    /// conditions with an index of a different ordering key.
    fn register_index(&self, index: Index) -> CoreResult<Index>;

    /// Removes an index, returning its definition if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn remove_index(&self, collection_name: &str, index_name: &str) -> CoreResult<Option<Index>>;
}

/// Outcome of checking a new collection against the stored one.
pub(crate) fn check_collection(
    existing: Option<Collection>,
    collection: &Collection,
) -> CoreResult<Option<Collection>> {
    collection.validate()?;
    match existing {
        Some(existing) if existing == *collection => Ok(Some(existing)),
        Some(_) => Err(CoreError::validation(format!(
            "collection {} already exists with a different definition",
            collection.name
        ))),
        None => Ok(None),
    }
}

/// Outcome of checking a new index against the collection's indexes.
///
/// Returns the stored index when `index` is already registered.
pub(crate) fn check_index(existing: &[Index], index: &Index) -> CoreResult<Option<Index>> {
    index.validate()?;
    let name = index.name();
    for other in existing {
        if other.name() == name {
            return Ok(Some(other.clone()));
        }
        if other.conditions == index.conditions {
            return Err(CoreError::validation(format!(
                "index {name} shares its conditions with index {}",
                other.name()
            )));
        }
    }
    Ok(None)
}
