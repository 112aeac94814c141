//! Fault-injecting record stores.
//!
//! [`FlakyStore`] wraps a store and fails selected operations with a
//! transient [`StorageError::Unavailable`], which lets tests check that one
//! failing index does not block the others and that redelivery repairs
//! the state.

use colonnade_storage::{InMemoryStore, Page, Record, RecordStore, StorageError, StorageResult};
use parking_lot::Mutex;

/// Store operation a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    /// Point reads.
    Get,
    /// Writes.
    Put,
    /// Deletes.
    Delete,
    /// Any of the scans.
    Scan,
}

#[derive(Debug)]
struct Fault {
    op: FaultOp,
    sort_key: Option<String>,
    remaining: usize,
}

/// Wraps a store and fails selected operations.
pub struct FlakyStore<S = InMemoryStore> {
    inner: S,
    faults: Mutex<Vec<Fault>>,
    injected: Mutex<usize>,
}

impl FlakyStore<InMemoryStore> {
    /// Wraps a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }
}

impl<S: RecordStore> FlakyStore<S> {
    /// Wraps `inner` without faults.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
            injected: Mutex::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fails the next `times` calls of `op`, on any sort key.
    pub fn fail_next(&self, op: FaultOp, times: usize) {
        self.faults.lock().push(Fault {
            op,
            sort_key: None,
            remaining: times,
        });
    }

    /// Fails the next `times` calls of `op` on `sort_key`.
    pub fn fail_on(&self, op: FaultOp, sort_key: &str, times: usize) {
        self.faults.lock().push(Fault {
            op,
            sort_key: Some(sort_key.to_owned()),
            remaining: times,
        });
    }

    /// Removes all pending faults.
    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    /// Number of faults injected so far.
    pub fn injected(&self) -> usize {
        *self.injected.lock()
    }

    fn check(&self, op: FaultOp, sort_key: &str) -> StorageResult<()> {
        let mut faults = self.faults.lock();
        let hit = faults.iter_mut().find(|f| {
            f.op == op
                && f.remaining > 0
                && f.sort_key.as_deref().map_or(true, |k| k == sort_key)
        });
        match hit {
            Some(fault) => {
                fault.remaining -= 1;
                *self.injected.lock() += 1;
                Err(StorageError::Unavailable(format!(
                    "injected {op:?} fault on {sort_key}"
                )))
            }
            None => Ok(()),
        }
    }
}

impl<S: RecordStore> RecordStore for FlakyStore<S> {
    fn get(&self, partition_key: &str, sort_key: &str) -> StorageResult<Option<Record>> {
        self.check(FaultOp::Get, sort_key)?;
        self.inner.get(partition_key, sort_key)
    }

    fn put(&self, record: Record) -> StorageResult<()> {
        self.check(FaultOp::Put, &record.sort_key)?;
        self.inner.put(record)
    }

    fn delete(&self, partition_key: &str, sort_key: &str) -> StorageResult<()> {
        self.check(FaultOp::Delete, sort_key)?;
        self.inner.delete(partition_key, sort_key)
    }

    fn scan_exact(
        &self,
        sort_key: &str,
        value: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        self.check(FaultOp::Scan, sort_key)?;
        self.inner.scan_exact(sort_key, value, start_after, limit)
    }

    fn scan_prefix(
        &self,
        sort_key: &str,
        prefix: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        self.check(FaultOp::Scan, sort_key)?;
        self.inner.scan_prefix(sort_key, prefix, start_after, limit)
    }

    fn scan_range(
        &self,
        sort_key: &str,
        lo: &str,
        hi: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        self.check(FaultOp::Scan, sort_key)?;
        self.inner.scan_range(sort_key, lo, hi, start_after, limit)
    }

    fn scan_all(
        &self,
        sort_key: &str,
        start_after: Option<&Record>,
        limit: usize,
    ) -> StorageResult<Page> {
        self.check(FaultOp::Scan, sort_key)?;
        self.inner.scan_all(sort_key, start_after, limit)
    }
}
