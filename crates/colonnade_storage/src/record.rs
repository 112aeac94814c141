//! Physical records and scan pages.

use std::fmt;

/// Primary key of a physical record.
///
/// Two records with the same `RecordKey` are the same record: a `put`
/// replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Partition key (`collection#id` for every record of a document).
    pub partition_key: String,
    /// Sort key (collection name for base records, index sort key otherwise).
    pub sort_key: String,
}

impl RecordKey {
    /// Creates a new record key.
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.sort_key)
    }
}

/// A physical record of the table.
///
/// `sort_value` is the range key of the global projection: records sharing a
/// `sort_key` are scanned in `(sort_value, partition_key)` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Partition key.
    pub partition_key: String,
    /// Sort key, also the hash key of the projection.
    pub sort_key: String,
    /// Range key of the projection.
    pub sort_value: String,
    /// Opaque payload. `None` for records that only point at another record.
    pub payload: Option<Vec<u8>>,
}

impl Record {
    /// Creates a record without payload.
    pub fn new(
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
        sort_value: impl Into<String>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
            sort_value: sort_value.into(),
            payload: None,
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Returns the primary key of this record.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.partition_key.clone(), self.sort_key.clone())
    }

    /// Returns true if `other` has the same key triple, ignoring payloads.
    #[must_use]
    pub fn same_position(&self, other: &Record) -> bool {
        self.partition_key == other.partition_key
            && self.sort_key == other.sort_key
            && self.sort_value == other.sort_value
    }
}

/// One page of an ordered scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Records in projection order.
    pub records: Vec<Record>,
    /// Whether more records follow the last one returned.
    pub has_more: bool,
}

impl Page {
    /// Returns the last record of the page, the resume point for the next one.
    #[must_use]
    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }

    /// Returns true if the page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
