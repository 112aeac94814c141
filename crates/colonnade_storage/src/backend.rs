//! Record store trait definition.

use crate::error::StorageResult;
use crate::record::{Page, Record};

/// A key-value table with one global range-scannable projection.
///
/// Records are addressed by `(partition_key, sort_key)`. The projection
/// groups records by `sort_key` and orders them by `(sort_value,
/// partition_key)`; every scan walks one such group.
///
/// # Invariants
///
/// - `put` atomically replaces any record stored under the same key
/// - `delete` of an absent key is not an error
/// - Scans return records in projection order, at most `limit` per page
/// - `start_after` is exclusive: the next page starts strictly after the
///   position `(start_after.sort_value, start_after.partition_key)`; the
///   marker record itself need not still exist
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
pub trait RecordStore: Send + Sync {
    /// Reads the record stored under `(partition_key, sort_key)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, partition_key: &str, sort_key: &str) -> StorageResult<Option<Record>>;

    /// Writes a record, replacing any record with the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the write fails.
    fn put(&self, record: Record) -> StorageResult<()>;

    /// Deletes the record stored under `(partition_key, sort_key)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails. Deleting a missing record succeeds.
    fn delete(&self, partition_key: &str, sort_key: &str) -> StorageResult<()>;

    /// Scans records whose `sort_value` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn scan_exact(
        &self,
        sort_key: &str,
        value: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page>;

    /// Scans records whose `sort_value` starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn scan_prefix(
        &self,
        sort_key: &str,
        prefix: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page>;

    /// Scans records with `lo <= sort_value <= hi`.
    ///
    /// # Errors
    ///
    /// Returns an error if `lo > hi` or the scan fails.
    fn scan_range(
        &self,
        sort_key: &str,
        lo: &str,
        hi: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page>;

    /// Scans every record of the `sort_key` group.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn scan_all(
        &self,
        sort_key: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page>;
}
