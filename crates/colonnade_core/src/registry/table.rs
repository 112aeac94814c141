//! Registry stored in the record store.
//!
//! Definitions are base records of the system collections:
//!
//! ```text
//! partition_key       sort_key     sort_value    payload
//! collection#book     collection   book          {"name":"book","id_key":"isbn",..}
//! index#book__genre   index        book__genre   {"name":"book__genre","collection_name":"book",..}
//! ```
//!
//! System collections are never indexed; listing the indexes of a
//! collection is a prefix scan over the `index` base records.

use super::{check_collection, check_index, MetadataRegistry};
use crate::config::SeparatorPolicy;
use crate::encoding::{decode_payload, partition_key, KeyEncoder};
use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Index, COLLECTION_COLLECTION, INDEX_COLLECTION, NAME_SEPARATOR};
use colonnade_storage::{Record, RecordStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const SCAN_BATCH: usize = 128;

/// Registry persisting definitions next to the documents they describe.
pub struct TableRegistry {
    store: Arc<dyn RecordStore>,
    collections: Collection,
    indexes: Collection,
    encoder: KeyEncoder,
}

impl TableRegistry {
    /// Creates a registry over `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            collections: Collection::new(COLLECTION_COLLECTION, "name"),
            indexes: Collection::new(INDEX_COLLECTION, "name"),
            encoder: KeyEncoder::new(SeparatorPolicy::Allow),
        }
    }

    fn load<T: serde::de::DeserializeOwned>(record: &Record) -> CoreResult<T> {
        let payload = record.payload.as_deref().ok_or_else(|| {
            CoreError::validation(format!(
                "metadata record {} has no payload",
                record.partition_key
            ))
        })?;
        Ok(serde_json::from_value(decode_payload(payload)?)?)
    }

    fn store_document(&self, meta: &Collection, document: &Value) -> CoreResult<()> {
        let record = self.encoder.encode_base(meta, document)?;
        debug!(partition_key = %record.partition_key, "storing metadata");
        self.store.put(record)?;
        Ok(())
    }
}

impl MetadataRegistry for TableRegistry {
    fn get_collection(&self, name: &str) -> CoreResult<Option<Collection>> {
        self.store
            .get(&partition_key(COLLECTION_COLLECTION, name), COLLECTION_COLLECTION)?
            .as_ref()
            .map(Self::load)
            .transpose()
    }

    fn list_indexes(&self, collection_name: &str) -> CoreResult<Vec<Index>> {
        let prefix = format!("{collection_name}{NAME_SEPARATOR}");
        let mut indexes = Vec::new();
        let mut start_after: Option<Record> = None;
        loop {
            let page = self
                .store
                .scan_prefix(INDEX_COLLECTION, &prefix, start_after.as_ref(), SCAN_BATCH)?;
            for record in &page.records {
                let index: Index = Self::load(record)?;
                // a collection named like a prefix of another shares the scan
                if index.collection_name == collection_name {
                    indexes.push(index);
                }
            }
            start_after = page.records.last().cloned();
            if !page.has_more || start_after.is_none() {
                break;
            }
        }
        Ok(indexes)
    }

    fn register_collection(&self, collection: Collection) -> CoreResult<Collection> {
        let existing = self.get_collection(&collection.name)?;
        if let Some(existing) = check_collection(existing, &collection)? {
            return Ok(existing);
        }
        self.store_document(&self.collections, &serde_json::to_value(&collection)?)?;
        Ok(collection)
    }

    fn register_index(&self, index: Index) -> CoreResult<Index> {
        if self.get_collection(&index.collection_name)?.is_none() {
            return Err(CoreError::collection_not_found(&index.collection_name));
        }
        let existing = self.list_indexes(&index.collection_name)?;
        if let Some(existing) = check_index(&existing, &index)? {
            return Ok(existing);
        }

        let mut document = serde_json::to_value(&index)?;
        if let Value::Object(fields) = &mut document {
            fields.insert("name".to_owned(), Value::String(index.name()));
        }
        self.store_document(&self.indexes, &document)?;
        Ok(index)
    }

    fn remove_index(&self, collection_name: &str, index_name: &str) -> CoreResult<Option<Index>> {
        let pk = partition_key(INDEX_COLLECTION, index_name);
        let Some(record) = self.store.get(&pk, INDEX_COLLECTION)? else {
            return Ok(None);
        };
        let index: Index = Self::load(&record)?;
        if index.collection_name != collection_name {
            return Ok(None);
        }
        self.store.delete(&pk, INDEX_COLLECTION)?;
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexConfiguration;
    use colonnade_storage::InMemoryStore;

    fn registry() -> (Arc<InMemoryStore>, TableRegistry) {
        let store = Arc::new(InMemoryStore::new());
        let registry = TableRegistry::new(store.clone());
        registry
            .register_collection(Collection::new("book", "isbn").ordering_key("published"))
            .unwrap();
        (store, registry)
    }

    #[test]
    fn collections_are_base_records() {
        let (store, registry) = registry();
        let record = store.get("collection#book", "collection").unwrap().unwrap();
        assert_eq!(record.sort_value, "book");

        let loaded = registry.get_collection("book").unwrap().unwrap();
        assert_eq!(loaded.ordering_key.as_deref(), Some("published"));
        assert!(registry.get_collection("film").unwrap().is_none());
    }

    #[test]
    fn indexes_round_trip() {
        let (store, registry) = registry();
        let genre = Index::new("book", ["genre"])
            .unwrap()
            .configuration(IndexConfiguration::OptimizeWrite);
        registry.register_index(genre.clone()).unwrap();
        registry
            .register_index(Index::new("book", ["author.name", "rating"]).unwrap())
            .unwrap();

        assert!(store.get("index#book__genre", "index").unwrap().is_some());
        let indexes = registry.list_indexes("book").unwrap();
        assert_eq!(indexes.len(), 2);
        assert!(indexes.contains(&genre));
    }

    #[test]
    fn prefix_sharing_collections_are_kept_apart() {
        let (_store, registry) = registry();
        registry
            .register_collection(Collection::new("book__archive", "isbn"))
            .unwrap();
        registry
            .register_index(Index::new("book__archive", ["genre"]).unwrap())
            .unwrap();
        registry
            .register_index(Index::new("book", ["title"]).unwrap())
            .unwrap();

        let names: Vec<String> = registry
            .list_indexes("book")
            .unwrap()
            .iter()
            .map(Index::name)
            .collect();
        assert_eq!(names, ["book__title"]);
    }

    #[test]
    fn conflicting_definitions() {
        let (_store, registry) = registry();
        assert!(registry
            .register_collection(Collection::new("book", "id"))
            .is_err());

        registry
            .register_index(Index::new("book", ["genre"]).unwrap())
            .unwrap();
        let ordered = Index::new("book", ["genre"]).unwrap().ordering_key("published").unwrap();
        assert!(registry.register_index(ordered).is_err());
    }

    #[test]
    fn remove_index() {
        let (store, registry) = registry();
        registry
            .register_index(Index::new("book", ["genre"]).unwrap())
            .unwrap();

        assert!(registry.remove_index("film", "book__genre").unwrap().is_none());
        assert!(registry.remove_index("book", "book__genre").unwrap().is_some());
        assert!(store.get("index#book__genre", "index").unwrap().is_none());
    }
}
