//! Pagination cursor resolution and page execution.
//!
//! Callers page with the logical id of the last document they saw. This
//! module turns that id back into the physical record the scan resumes
//! after, runs one page of a [`ScanPlan`] and turns the page back into
//! documents plus the next id.

use crate::config::MissingCursorPolicy;
use crate::encoding::{decode_payload, id_from_partition_key, index_sort_key, partition_key, KeyEncoder};
use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Index};
use crate::query::{Predicate, ScanPlan};
use colonnade_storage::{Page, Record, RecordStore};
use serde_json::Value;
use tracing::{debug, warn};

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    /// Documents in scan order.
    pub documents: Vec<Value>,
    /// Id to pass as `start_from` for the next page; `None` on the last page.
    pub next_start_from: Option<String>,
}

/// Translates logical cursors to scan positions and runs pages.
pub struct CursorResolver<'a> {
    store: &'a dyn RecordStore,
    encoder: KeyEncoder,
    policy: MissingCursorPolicy,
}

impl<'a> CursorResolver<'a> {
    /// Creates a resolver over `store`.
    pub fn new(store: &'a dyn RecordStore, encoder: KeyEncoder, policy: MissingCursorPolicy) -> Self {
        Self {
            store,
            encoder,
            policy,
        }
    }

    /// Resolves `start_from` to the record a scan resumes after.
    ///
    /// With an index, the index record of the document is looked up; when
    /// it is missing but the base record still exists, the index record is
    /// re-encoded from it. Without an index the base record is the resume
    /// point. Returns `Ok(None)` when the document is gone and the policy
    /// is [`MissingCursorPolicy::Restart`].
    ///
    /// # Errors
    ///
    /// Returns `CursorNotFound` when the document is gone under
    /// [`MissingCursorPolicy::Fail`], or a storage error.
    pub fn resolve_cursor(
        &self,
        collection: &Collection,
        index: Option<&Index>,
        start_from: &str,
    ) -> CoreResult<Option<Record>> {
        let pk = partition_key(&collection.name, start_from);
        let resolved = match index {
            Some(index) => match self.store.get(&pk, &index_sort_key(index))? {
                Some(record) => Some(record),
                None => self.reencode(collection, index, &pk)?,
            },
            None => self.store.get(&pk, &collection.name)?,
        };
        if resolved.is_some() {
            return Ok(resolved);
        }

        match self.policy {
            MissingCursorPolicy::Fail => Err(CoreError::CursorNotFound {
                collection: collection.name.clone(),
                id: start_from.to_owned(),
            }),
            MissingCursorPolicy::Restart => {
                warn!(collection = %collection.name, id = start_from, "cursor target gone, restarting scan");
                Ok(None)
            }
        }
    }

    fn reencode(&self, collection: &Collection, index: &Index, pk: &str) -> CoreResult<Option<Record>> {
        let Some(base) = self.store.get(pk, &collection.name)? else {
            return Ok(None);
        };
        let Some(payload) = base.payload.as_deref() else {
            return Ok(None);
        };
        let document = decode_payload(payload)?;
        let record = self.encoder.encode_index(collection, index, &document)?;
        if record.is_some() {
            debug!(partition_key = pk, index = %index.name(), "cursor resolved from base record");
        }
        Ok(record)
    }

    /// Runs one page of `plan`.
    ///
    /// `index` must be the index the plan was compiled against; it is
    /// ignored for a full scan. Documents the scan bounds admit but
    /// `predicate` rejects are dropped, so a page may hold fewer documents
    /// than `limit`. `next_start_from` is set only when the scan filled the
    /// page and has more records.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPredicate` if `index` does not match the plan,
    /// `CursorNotFound` per the cursor policy, or a storage or decoding
    /// error.
    pub fn fetch_page(
        &self,
        collection: &Collection,
        predicate: &Predicate,
        plan: &ScanPlan,
        index: Option<&Index>,
        start_from: Option<&str>,
        limit: usize,
    ) -> CoreResult<QueryPage> {
        let index = if plan.uses_index() {
            match index {
                Some(index) if index_sort_key(index) == plan.sort_key() => Some(index),
                _ => {
                    return Err(CoreError::invalid_predicate(format!(
                        "plan {plan} needs the index it was compiled against"
                    )))
                }
            }
        } else {
            None
        };

        let start_after = match start_from {
            Some(id) => self.resolve_cursor(collection, index, id)?,
            None => None,
        };
        let limit = limit.max(1);
        let page = self.scan(plan, start_after.as_ref(), limit)?;

        let mut documents = Vec::with_capacity(page.records.len());
        for record in &page.records {
            match self.materialize(collection, record)? {
                Some(document) if predicate.matches(&document) => documents.push(document),
                Some(_) => {
                    debug!(partition_key = %record.partition_key, "scanned document outside predicate");
                }
                None => {}
            }
        }

        let next_start_from = if page.records.len() == limit && page.has_more {
            page.last()
                .and_then(|r| id_from_partition_key(&collection.name, &r.partition_key))
                .map(str::to_owned)
        } else {
            None
        };
        Ok(QueryPage {
            documents,
            next_start_from,
        })
    }

    fn scan(&self, plan: &ScanPlan, start_after: Option<&Record>, limit: usize) -> CoreResult<Page> {
        let page = match plan {
            ScanPlan::FullScan { sort_key } => self.store.scan_all(sort_key, start_after, limit)?,
            ScanPlan::ExactMatch { sort_key, value } => {
                self.store.scan_exact(sort_key, value, start_after, limit)?
            }
            ScanPlan::PrefixScan { sort_key, prefix } => {
                self.store.scan_prefix(sort_key, prefix, start_after, limit)?
            }
            ScanPlan::BoundedScan { sort_key, lo, hi } => {
                self.store.scan_range(sort_key, lo, hi, start_after, limit)?
            }
        };
        Ok(page)
    }

    /// Document behind a scanned record. `OPTIMIZE_WRITE` index records are
    /// followed to their base record; a missing base record yields `None`.
    fn materialize(&self, collection: &Collection, record: &Record) -> CoreResult<Option<Value>> {
        if let Some(payload) = record.payload.as_deref() {
            return decode_payload(payload).map(Some);
        }
        match self.store.get(&record.partition_key, &collection.name)? {
            Some(Record {
                payload: Some(payload),
                ..
            }) => decode_payload(&payload).map(Some),
            _ => {
                warn!(
                    partition_key = %record.partition_key,
                    sort_key = %record.sort_key,
                    "index record without base record, skipping"
                );
                Ok(None)
            }
        }
    }
}
