//! In-process metadata registry.

use super::{check_collection, check_index, MetadataRegistry};
use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Index};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Definitions {
    collections: HashMap<String, Collection>,
    indexes: HashMap<String, Vec<Index>>,
}

/// Registry holding definitions in memory.
///
/// Registration is atomic: checks and writes happen under one lock.
#[derive(Default)]
pub struct InMemoryRegistry {
    definitions: RwLock<Definitions>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataRegistry for InMemoryRegistry {
    fn get_collection(&self, name: &str) -> CoreResult<Option<Collection>> {
        Ok(self.definitions.read().collections.get(name).cloned())
    }

    fn list_indexes(&self, collection_name: &str) -> CoreResult<Vec<Index>> {
        Ok(self
            .definitions
            .read()
            .indexes
            .get(collection_name)
            .cloned()
            .unwrap_or_default())
    }

    fn register_collection(&self, collection: Collection) -> CoreResult<Collection> {
        let mut definitions = self.definitions.write();
        let existing = definitions.collections.get(&collection.name).cloned();
        if let Some(existing) = check_collection(existing, &collection)? {
            return Ok(existing);
        }
        definitions
            .collections
            .insert(collection.name.clone(), collection.clone());
        Ok(collection)
    }

    fn register_index(&self, index: Index) -> CoreResult<Index> {
        let mut definitions = self.definitions.write();
        if !definitions.collections.contains_key(&index.collection_name) {
            return Err(CoreError::collection_not_found(&index.collection_name));
        }
        let indexes = definitions
            .indexes
            .entry(index.collection_name.clone())
            .or_default();
        if let Some(existing) = check_index(indexes, &index)? {
            return Ok(existing);
        }
        indexes.push(index.clone());
        Ok(index)
    }

    fn remove_index(&self, collection_name: &str, index_name: &str) -> CoreResult<Option<Index>> {
        let mut definitions = self.definitions.write();
        let Some(indexes) = definitions.indexes.get_mut(collection_name) else {
            return Ok(None);
        };
        let position = indexes.iter().position(|i| i.name() == index_name);
        Ok(position.map(|p| indexes.remove(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_list() {
        let registry = InMemoryRegistry::new();
        registry
            .register_collection(Collection::new("book", "isbn"))
            .unwrap();
        registry
            .register_index(Index::new("book", ["genre"]).unwrap())
            .unwrap();
        registry
            .register_index(Index::new("book", ["author.name", "rating"]).unwrap())
            .unwrap();

        assert!(registry.get_collection("book").unwrap().is_some());
        assert!(registry.get_collection("film").unwrap().is_none());
        assert_eq!(registry.list_indexes("book").unwrap().len(), 2);
        assert!(registry.list_indexes("film").unwrap().is_empty());
    }

    #[test]
    fn index_needs_collection() {
        let registry = InMemoryRegistry::new();
        let err = registry
            .register_index(Index::new("book", ["genre"]).unwrap())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn remove_index() {
        let registry = InMemoryRegistry::new();
        registry
            .register_collection(Collection::new("book", "isbn"))
            .unwrap();
        registry
            .register_index(Index::new("book", ["genre"]).unwrap())
            .unwrap();

        let removed = registry.remove_index("book", "book__genre").unwrap();
        assert!(removed.is_some());
        assert!(registry.remove_index("book", "book__genre").unwrap().is_none());
        assert!(registry.list_indexes("book").unwrap().is_empty());
    }
}
