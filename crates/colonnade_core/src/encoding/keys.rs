//! Physical record layout of base and index records.

use super::value::{field_value, KeyValue};
use super::SEPARATOR;
use crate::config::SeparatorPolicy;
use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Index};
use colonnade_storage::Record;
use serde_json::Value;

/// Partition key shared by every record of one document.
#[must_use]
pub fn partition_key(collection_name: &str, id: &str) -> String {
    format!("{collection_name}{SEPARATOR}{id}")
}

/// Extracts the logical id from a partition key of `collection_name`.
#[must_use]
pub fn id_from_partition_key<'a>(collection_name: &str, partition_key: &'a str) -> Option<&'a str> {
    partition_key
        .strip_prefix(collection_name)?
        .strip_prefix(SEPARATOR)
}

/// Sort key of every record of `index`.
#[must_use]
pub fn index_sort_key(index: &Index) -> String {
    let mut key = index.collection_name.clone();
    for condition in &index.conditions {
        key.push(SEPARATOR);
        key.push_str(condition);
    }
    key
}

/// Returns true if `sort_key` belongs to an index record.
///
/// Collection names never contain the separator, so base records are the
/// only records whose sort key lacks one.
#[must_use]
pub fn is_index_sort_key(sort_key: &str) -> bool {
    sort_key.contains(SEPARATOR)
}

/// Serializes a document as a record payload.
///
/// # Errors
///
/// Returns `Serialization` if the document cannot be encoded.
pub fn encode_payload(document: &Value) -> CoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(document)?)
}

/// Deserializes a record payload.
///
/// # Errors
///
/// Returns `Serialization` if the bytes are not a JSON document.
pub fn decode_payload(payload: &[u8]) -> CoreResult<Value> {
    Ok(serde_json::from_slice(payload)?)
}

/// Reads the logical id of a document.
///
/// # Errors
///
/// Returns `Validation` if the `id_key` field is missing, not a scalar,
/// or empty.
pub fn document_id(collection: &Collection, document: &Value) -> CoreResult<String> {
    let id = field_value(document, &collection.id_key)
        .map(|v| v.canonical())
        .ok_or_else(|| {
            CoreError::validation(format!(
                "document in {} is missing id field {}",
                collection.name, collection.id_key
            ))
        })?;
    if id.is_empty() {
        return Err(CoreError::validation(format!(
            "document in {} has an empty id",
            collection.name
        )));
    }
    Ok(id)
}

/// Maps documents onto physical records.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyEncoder {
    separator: SeparatorPolicy,
}

impl KeyEncoder {
    /// Creates an encoder with the given separator policy.
    #[must_use]
    pub const fn new(separator: SeparatorPolicy) -> Self {
        Self { separator }
    }

    /// Returns the separator policy.
    #[must_use]
    pub const fn separator(&self) -> SeparatorPolicy {
        self.separator
    }

    /// Encodes the base record of a document.
    ///
    /// `sort_value` is the id, suffixed with the ordering value when the
    /// collection has an ordering key and the document carries it. The
    /// payload is the full document.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the id is missing or the ordering value
    /// contains the separator under [`SeparatorPolicy::Reject`].
    pub fn encode_base(&self, collection: &Collection, document: &Value) -> CoreResult<Record> {
        let id = document_id(collection, document)?;
        let mut sort_value = id.clone();
        if let Some(key) = &collection.ordering_key {
            if let Some(ordering) = field_value(document, key) {
                sort_value.push(SEPARATOR);
                sort_value.push_str(&self.checked(key, ordering)?);
            }
        }

        Ok(Record::new(
            partition_key(&collection.name, &id),
            collection.name.clone(),
            sort_value,
        )
        .with_payload(encode_payload(document)?))
    }

    /// Encodes the record of `index` for a document.
    ///
    /// Returns `Ok(None)` when any condition field is absent or null: the
    /// document is simply not part of the index. For an index with an
    /// ordering key every record carries the ordering suffix, empty when the
    /// document lacks the field.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the index belongs to another collection, the
    /// id is missing, or a value contains the separator under
    /// [`SeparatorPolicy::Reject`].
    pub fn encode_index(
        &self,
        collection: &Collection,
        index: &Index,
        document: &Value,
    ) -> CoreResult<Option<Record>> {
        if index.collection_name != collection.name {
            return Err(CoreError::validation(format!(
                "index {} does not belong to collection {}",
                index.name(),
                collection.name
            )));
        }
        let id = document_id(collection, document)?;
        let Some(sort_value) = self.index_sort_value(index, document)? else {
            return Ok(None);
        };

        let record = Record::new(
            partition_key(&collection.name, &id),
            index_sort_key(index),
            sort_value,
        );
        Ok(Some(if index.stores_payload() {
            record.with_payload(encode_payload(document)?)
        } else {
            record
        }))
    }

    /// Composite sort value of `index` for a document, if all conditions are
    /// present.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a value contains the separator under
    /// [`SeparatorPolicy::Reject`].
    pub fn index_sort_value(&self, index: &Index, document: &Value) -> CoreResult<Option<String>> {
        let mut parts = Vec::with_capacity(index.conditions.len() + 1);
        for condition in &index.conditions {
            let Some(value) = field_value(document, condition) else {
                return Ok(None);
            };
            parts.push(self.checked(condition, value)?);
        }
        if let Some(key) = &index.ordering_key {
            let ordering = field_value(document, key)
                .map(|v| self.checked(key, v))
                .transpose()?
                .unwrap_or_default();
            parts.push(ordering);
        }
        let separator = SEPARATOR.to_string();
        Ok(Some(parts.join(separator.as_str())))
    }

    /// Canonicalizes a value and applies the separator policy.
    fn checked(&self, field: &str, value: KeyValue) -> CoreResult<String> {
        let canonical = value.canonical();
        if self.separator == SeparatorPolicy::Reject && canonical.contains(SEPARATOR) {
            return Err(CoreError::validation(format!(
                "value of {field} contains the key separator '{SEPARATOR}': {canonical:?}"
            )));
        }
        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexConfiguration;
    use serde_json::json;

    fn book() -> Collection {
        Collection::new("book", "isbn")
    }

    #[test]
    fn base_record_layout() {
        let doc = json!({"isbn": "1", "title": "Dune"});
        let record = KeyEncoder::default().encode_base(&book(), &doc).unwrap();
        assert_eq!(record.partition_key, "book#1");
        assert_eq!(record.sort_key, "book");
        assert_eq!(record.sort_value, "1");
        assert_eq!(decode_payload(record.payload.as_deref().unwrap()).unwrap(), doc);
    }

    #[test]
    fn base_record_ordering_suffix() {
        let collection = book().ordering_key("published");
        let encoder = KeyEncoder::default();

        let with = encoder
            .encode_base(&collection, &json!({"isbn": "1", "published": 1999}))
            .unwrap();
        assert_eq!(with.sort_value, "1#1999");

        let without = encoder.encode_base(&collection, &json!({"isbn": "1"})).unwrap();
        assert_eq!(without.sort_value, "1");
    }

    #[test]
    fn missing_id_is_rejected() {
        let err = KeyEncoder::default()
            .encode_base(&book(), &json!({"title": "Dune"}))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn index_record_layout() {
        let index = Index::new("book", ["author.name", "rating"]).unwrap();
        let doc = json!({"isbn": "1", "author": {"name": "Larsson"}, "rating": 5});
        let record = KeyEncoder::default()
            .encode_index(&book(), &index, &doc)
            .unwrap()
            .unwrap();
        assert_eq!(record.partition_key, "book#1");
        assert_eq!(record.sort_key, "book#author.name#rating");
        assert_eq!(record.sort_value, "Larsson#5");
        assert!(record.payload.is_some());
    }

    #[test]
    fn optimize_write_has_no_payload() {
        let index = Index::new("book", ["genre"])
            .unwrap()
            .configuration(IndexConfiguration::OptimizeWrite);
        let record = KeyEncoder::default()
            .encode_index(&book(), &index, &json!({"isbn": "1", "genre": "scifi"}))
            .unwrap()
            .unwrap();
        assert!(record.payload.is_none());
    }

    #[test]
    fn sparse_index() {
        let index = Index::new("book", ["author.name", "rating"]).unwrap();
        let encoder = KeyEncoder::default();
        for doc in [
            json!({"isbn": "1", "author": {"name": "Larsson"}}),
            json!({"isbn": "1", "author": {"name": null}, "rating": 3}),
            json!({"isbn": "1", "author": "Larsson", "rating": 3}),
        ] {
            assert!(encoder.encode_index(&book(), &index, &doc).unwrap().is_none());
        }
    }

    #[test]
    fn ordered_index_always_has_suffix() {
        let index = Index::new("book", ["genre"]).unwrap().ordering_key("published").unwrap();
        let encoder = KeyEncoder::default();

        let with = encoder
            .encode_index(&book(), &index, &json!({"isbn": "1", "genre": "scifi", "published": "2001"}))
            .unwrap()
            .unwrap();
        assert_eq!(with.sort_value, "scifi#2001");

        let without = encoder
            .encode_index(&book(), &index, &json!({"isbn": "1", "genre": "scifi"}))
            .unwrap()
            .unwrap();
        assert_eq!(without.sort_value, "scifi#");
    }

    #[test]
    fn separator_policy() {
        let index = Index::new("book", ["genre"]).unwrap();
        let doc = json!({"isbn": "a#b", "genre": "sci#fi"});

        let err = KeyEncoder::new(SeparatorPolicy::Reject)
            .encode_index(&book(), &index, &doc)
            .unwrap_err();
        assert!(err.is_validation());

        let record = KeyEncoder::new(SeparatorPolicy::Allow)
            .encode_index(&book(), &index, &doc)
            .unwrap()
            .unwrap();
        assert_eq!(record.sort_value, "sci#fi");
        assert_eq!(id_from_partition_key("book", &record.partition_key), Some("a#b"));
    }

    #[test]
    fn foreign_index_is_rejected() {
        let index = Index::new("film", ["genre"]).unwrap();
        assert!(KeyEncoder::default()
            .encode_index(&book(), &index, &json!({"isbn": "1", "genre": "x"}))
            .is_err());
    }

    #[test]
    fn partition_key_round_trip() {
        assert_eq!(partition_key("book", "42"), "book#42");
        assert_eq!(id_from_partition_key("book", "book#42"), Some("42"));
        assert_eq!(id_from_partition_key("book", "bookshelf#42"), None);
        assert!(is_index_sort_key("book#genre"));
        assert!(!is_index_sort_key("book"));
    }
}
