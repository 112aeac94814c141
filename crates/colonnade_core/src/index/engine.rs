//! Index maintenance engine.
//!
//! Applies the per-index plans of a mutation to a record store, and
//! backfills or drops whole indexes.
//!
//! # Invariants
//!
//! - Every write is keyed by `(partition_key, sort_key)` and overwrites, so
//!   re-applying a mutation converges to the same state
//! - A failing index does not stop the remaining indexes of a mutation
//! - An identity collision aborts the mutation and is never retried
//! - The base record of a deleted document goes last, once no index
//!   failed, so a redelivered delete can still locate every index record

use super::plan::{plan_index, IndexAction, Mutation};
use crate::encoding::{decode_payload, document_id, index_sort_key, partition_key, KeyEncoder};
use crate::error::{CoreError, CoreResult, IndexFailure};
use crate::model::{Collection, Index};
use colonnade_storage::{Record, RecordStore};
use tracing::{debug, error, info, warn};

/// Page size used when walking whole sort-key groups.
const BATCH_SIZE: usize = 256;

/// Outcome of maintaining the indexes of one mutation.
#[derive(Debug, Default)]
pub struct MaintenanceReport {
    /// Collection of the mutated document.
    pub collection: String,
    /// Logical id of the mutated document.
    pub id: String,
    /// Index records written for the first time.
    pub created: usize,
    /// Index records whose document copy was overwritten.
    pub refreshed: usize,
    /// Index records that changed position.
    pub moved: usize,
    /// Index records deleted.
    pub removed: usize,
    /// Indexes left untouched.
    pub unchanged: usize,
    /// Indexes that failed.
    pub failures: Vec<IndexFailure>,
}

impl MaintenanceReport {
    fn new(collection: &str, id: &str) -> Self {
        Self {
            collection: collection.to_owned(),
            id: id.to_owned(),
            ..Self::default()
        }
    }

    /// Returns true if every index was maintained.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of index records written or deleted.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.created + self.refreshed + self.moved + self.removed
    }

    /// Converts collected failures into an error.
    ///
    /// # Errors
    ///
    /// Returns `IndexMaintenance` if any index failed.
    pub fn into_result(self) -> CoreResult<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(CoreError::IndexMaintenance {
                collection: self.collection,
                id: self.id,
                failures: self.failures,
            })
        }
    }
}

/// Applies index maintenance against a record store.
///
/// The engine holds no state of its own; concurrent use for different
/// documents is safe as long as the store is.
pub struct IndexEngine<'a> {
    store: &'a dyn RecordStore,
    encoder: KeyEncoder,
}

impl<'a> IndexEngine<'a> {
    /// Creates an engine over `store`.
    pub fn new(store: &'a dyn RecordStore, encoder: KeyEncoder) -> Self {
        Self { store, encoder }
    }

    /// Brings every index of `collection` in line with `mutation`.
    ///
    /// For a delete, the base record is removed as well. Documents of
    /// system collections are never indexed.
    ///
    /// # Errors
    ///
    /// - `Validation` if an image lacks its id
    /// - `InconsistentIndex` if the images carry different ids, or a stored
    ///   index record belongs to another document
    /// - `Storage` if the base record cannot be deleted
    ///
    /// Failures of individual indexes are collected in the report instead.
    pub fn apply(
        &self,
        collection: &Collection,
        indexes: &[Index],
        mutation: &Mutation,
    ) -> CoreResult<MaintenanceReport> {
        let id = mutation_id(collection, mutation)?;
        let mut report = MaintenanceReport::new(&collection.name, &id);
        if collection.is_system() {
            debug!(collection = %collection.name, "skipping index maintenance for system collection");
            return Ok(report);
        }

        for index in indexes.iter().filter(|i| i.collection_name == collection.name) {
            match self.maintain(collection, index, mutation, &id) {
                Ok(Some(action)) => match action {
                    Applied::Created => report.created += 1,
                    Applied::Refreshed => report.refreshed += 1,
                    Applied::Moved => report.moved += 1,
                    Applied::Removed => report.removed += 1,
                },
                Ok(None) => report.unchanged += 1,
                Err(e @ CoreError::InconsistentIndex { .. }) => {
                    error!(index = %index.name(), id = %id, error = %e, "index integrity violation");
                    return Err(e);
                }
                Err(e) => {
                    warn!(index = %index.name(), id = %id, error = %e, "index maintenance failed");
                    report.failures.push(IndexFailure {
                        index_name: index.name(),
                        error: e,
                    });
                }
            }
        }

        if matches!(mutation, Mutation::Delete { .. }) && report.is_clean() {
            self.store
                .delete(&partition_key(&collection.name, &id), &collection.name)?;
        }

        debug!(
            collection = %collection.name,
            id = %id,
            mutation = mutation.kind(),
            writes = report.writes(),
            failures = report.failures.len(),
            "index maintenance applied"
        );
        Ok(report)
    }

    fn maintain(
        &self,
        collection: &Collection,
        index: &Index,
        mutation: &Mutation,
        id: &str,
    ) -> CoreResult<Option<Applied>> {
        let Some(action) = plan_index(&self.encoder, collection, index, mutation)? else {
            return Ok(None);
        };
        let applied = match action {
            IndexAction::Create(record) => {
                self.write(collection, index, record, id)?;
                Applied::Created
            }
            IndexAction::Refresh(record) => {
                self.write(collection, index, record, id)?;
                Applied::Refreshed
            }
            IndexAction::Move { from, to } => {
                if from.key() != to.key() {
                    self.store.delete(&from.partition_key, &from.sort_key)?;
                }
                self.write(collection, index, to, id)?;
                Applied::Moved
            }
            IndexAction::Remove(key) => {
                self.store.delete(&key.partition_key, &key.sort_key)?;
                Applied::Removed
            }
        };
        Ok(Some(applied))
    }

    /// Writes an index record after checking that a stored document copy at
    /// the same key belongs to the same document.
    fn write(&self, collection: &Collection, index: &Index, record: Record, id: &str) -> CoreResult<()> {
        if index.stores_payload() {
            let existing = self.store.get(&record.partition_key, &record.sort_key)?;
            if let Some(payload) = existing.as_ref().and_then(|r| r.payload.as_deref()) {
                let existing_id = document_id(collection, &decode_payload(payload)?)?;
                if existing_id != id {
                    return Err(CoreError::InconsistentIndex {
                        index_name: index.name(),
                        partition_key: record.partition_key,
                        existing_id,
                        incoming_id: id.to_owned(),
                    });
                }
            }
        }
        self.store.put(record)?;
        Ok(())
    }

    /// Writes the records of `index` for every document of `collection`.
    ///
    /// Documents that cannot be encoded under the current separator policy
    /// are skipped. Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a base record cannot be
    /// decoded.
    pub fn rebuild_index(&self, collection: &Collection, index: &Index) -> CoreResult<usize> {
        let mut written = 0;
        let mut skipped = 0;
        let mut start_after: Option<Record> = None;
        loop {
            let page = self
                .store
                .scan_all(&collection.name, start_after.as_ref(), BATCH_SIZE)?;
            for base in &page.records {
                let Some(payload) = base.payload.as_deref() else {
                    warn!(partition_key = %base.partition_key, "base record without document");
                    continue;
                };
                let document = decode_payload(payload)?;
                match self.encoder.encode_index(collection, index, &document) {
                    Ok(Some(record)) => {
                        self.store.put(record)?;
                        written += 1;
                    }
                    Ok(None) => {}
                    Err(e) if e.is_validation() => {
                        warn!(partition_key = %base.partition_key, error = %e, "document not indexable");
                        skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            start_after = page.records.last().cloned();
            if !page.has_more || start_after.is_none() {
                break;
            }
        }
        info!(index = %index.name(), written, skipped, "index backfilled");
        Ok(written)
    }

    /// Deletes every record of `index`. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn drop_index_records(&self, index: &Index) -> CoreResult<usize> {
        let sort_key = index_sort_key(index);
        let mut removed = 0;
        loop {
            let page = self.store.scan_all(&sort_key, None, BATCH_SIZE)?;
            for record in &page.records {
                self.store.delete(&record.partition_key, &record.sort_key)?;
                removed += 1;
            }
            if !page.has_more || page.is_empty() {
                break;
            }
        }
        info!(index = %index.name(), removed, "index records dropped");
        Ok(removed)
    }
}

enum Applied {
    Created,
    Refreshed,
    Moved,
    Removed,
}

/// Logical id of a mutation; both images of an update must agree.
fn mutation_id(collection: &Collection, mutation: &Mutation) -> CoreResult<String> {
    match mutation {
        Mutation::Create { new } => document_id(collection, new),
        Mutation::Delete { old } => document_id(collection, old),
        Mutation::Update { old, new } => {
            let existing_id = document_id(collection, old)?;
            let incoming_id = document_id(collection, new)?;
            if existing_id != incoming_id {
                return Err(CoreError::InconsistentIndex {
                    index_name: collection.name.clone(),
                    partition_key: partition_key(&collection.name, &existing_id),
                    existing_id,
                    incoming_id,
                });
            }
            Ok(incoming_id)
        }
    }
}
