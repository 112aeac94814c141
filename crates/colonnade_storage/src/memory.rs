//! In-memory record store for testing.

use crate::backend::RecordStore;
use crate::error::{StorageError, StorageResult};
use crate::record::{Page, Record, RecordKey};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Projection position: `(sort_value, partition_key)`.
type Position = (String, String);

#[derive(Debug, Default)]
struct Tables {
    /// Primary table keyed by `(partition_key, sort_key)`.
    records: BTreeMap<RecordKey, Record>,
    /// Global projection: `sort_key` -> ordered positions.
    projection: BTreeMap<String, BTreeSet<Position>>,
}

impl Tables {
    fn insert(&mut self, record: Record) {
        let key = record.key();
        if let Some(previous) = self.records.remove(&key) {
            self.unproject(&previous);
        }
        self.projection
            .entry(record.sort_key.clone())
            .or_default()
            .insert((record.sort_value.clone(), record.partition_key.clone()));
        self.records.insert(key, record);
    }

    fn remove(&mut self, key: &RecordKey) {
        if let Some(previous) = self.records.remove(key) {
            self.unproject(&previous);
        }
    }

    fn unproject(&mut self, record: &Record) {
        if let Some(group) = self.projection.get_mut(&record.sort_key) {
            group.remove(&(record.sort_value.clone(), record.partition_key.clone()));
            if group.is_empty() {
                self.projection.remove(&record.sort_key);
            }
        }
    }
}

/// An in-memory record store.
///
/// This store keeps the primary table and the projection in ordered maps
/// and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral tables that don't need persistence
///
/// # Thread Safety
///
/// Both maps sit behind one lock, so every `put` and `delete` updates the
/// table and its projection atomically.
///
/// # Example
///
/// ```rust
/// use colonnade_storage::{InMemoryStore, Record, RecordStore};
///
/// let store = InMemoryStore::new();
/// store.put(Record::new("book#1", "book#genre", "thriller")).unwrap();
/// store.put(Record::new("book#2", "book#genre", "scifi")).unwrap();
///
/// let page = store.scan_exact("book#genre", "thriller", None, 10).unwrap();
/// assert_eq!(page.records[0].partition_key, "book#1");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in the primary table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().records.len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of every record in primary-key order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.tables.read().records.values().cloned().collect()
    }

    /// Removes every record.
    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.records.clear();
        tables.projection.clear();
    }

    /// Walks the `sort_key` group from `from` while `within` holds.
    fn scan_group<F>(
        &self,
        sort_key: &str,
        from: &str,
        within: F,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page>
    where
        F: Fn(&str) -> bool,
    {
        let tables = self.tables.read();
        let Some(group) = tables.projection.get(sort_key) else {
            return Ok(Page::default());
        };

        let mut positions = group
            .range((start_bound(from, start_after), Bound::Unbounded))
            .take_while(|(sort_value, _)| within(sort_value));

        let mut records = Vec::with_capacity(limit.min(64));
        for (_, partition_key) in positions.by_ref().take(limit) {
            let key = RecordKey::new(partition_key.as_str(), sort_key);
            let record = tables.records.get(&key).ok_or_else(|| {
                StorageError::Corrupted(format!("projection entry without record: {key}"))
            })?;
            records.push(record.clone());
        }
        let has_more = positions.next().is_some();

        Ok(Page { records, has_more })
    }
}

/// Computes the first position to visit: the greater of the scan floor and
/// the exclusive resume marker.
fn start_bound(from: &str, start_after: Option<&Record>) -> Bound<Position> {
    let floor = (from.to_owned(), String::new());
    match start_after {
        Some(marker) => {
            let position = (marker.sort_value.clone(), marker.partition_key.clone());
            if position >= floor {
                Bound::Excluded(position)
            } else {
                Bound::Included(floor)
            }
        }
        None => Bound::Included(floor),
    }
}

impl RecordStore for InMemoryStore {
    fn get(&self, partition_key: &str, sort_key: &str) -> StorageResult<Option<Record>> {
        let key = RecordKey::new(partition_key, sort_key);
        Ok(self.tables.read().records.get(&key).cloned())
    }

    fn put(&self, record: Record) -> StorageResult<()> {
        if record.partition_key.is_empty() || record.sort_key.is_empty() {
            return Err(StorageError::invalid_key(format!(
                "partition and sort keys must be non-empty, got {}",
                record.key()
            )));
        }
        self.tables.write().insert(record);
        Ok(())
    }

    fn delete(&self, partition_key: &str, sort_key: &str) -> StorageResult<()> {
        self.tables
            .write()
            .remove(&RecordKey::new(partition_key, sort_key));
        Ok(())
    }

    fn scan_exact(
        &self,
        sort_key: &str,
        value: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        self.scan_group(sort_key, value, |v| v == value, start_after, limit)
    }

    fn scan_prefix(
        &self,
        sort_key: &str,
        prefix: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        self.scan_group(sort_key, prefix, |v| v.starts_with(prefix), start_after, limit)
    }

    fn scan_range(
        &self,
        sort_key: &str,
        lo: &str,
        hi: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        if lo > hi {
            return Err(StorageError::InvalidRange {
                sort_key: sort_key.to_owned(),
                lo: lo.to_owned(),
                hi: hi.to_owned(),
            });
        }
        self.scan_group(sort_key, lo, |v| v <= hi, start_after, limit)
    }

    fn scan_all(
        &self,
        sort_key: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        self.scan_group(sort_key, "", |_| true, start_after, limit)
    }
}
