//! Error types for Colonnade core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Colonnade core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Record store error.
    #[error("storage error: {0}")]
    Storage(#[from] colonnade_storage::StorageError),

    /// Document or metadata payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Collection is not registered.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// Document does not exist.
    #[error("document {id} not found in collection {collection}")]
    DocumentNotFound {
        /// Collection searched.
        collection: String,
        /// Logical id.
        id: String,
    },

    /// Pagination cursor points at a document that no longer exists.
    #[error("start cursor {id} not found in collection {collection}")]
    CursorNotFound {
        /// Collection searched.
        collection: String,
        /// Logical id carried by the cursor.
        id: String,
    },

    /// Document or metadata failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violation.
        message: String,
    },

    /// Predicate cannot be compiled against the chosen index.
    #[error("invalid predicate: {message}")]
    InvalidPredicate {
        /// Description of the violation.
        message: String,
    },

    /// No registered index covers the predicate's fields.
    #[error("no index on {collection} covers fields {fields:?}")]
    NoMatchingIndex {
        /// Collection queried.
        collection: String,
        /// Predicate fields in order.
        fields: Vec<String>,
    },

    /// Two different logical documents map to the same physical index record.
    #[error(
        "inconsistent index {index_name}: record {partition_key} belongs to {existing_id}, mutation carries {incoming_id}"
    )]
    InconsistentIndex {
        /// Index whose record collided.
        index_name: String,
        /// Partition key of the colliding record.
        partition_key: String,
        /// Logical id currently stored.
        existing_id: String,
        /// Logical id of the mutation.
        incoming_id: String,
    },

    /// One or more indexes failed while applying a mutation.
    #[error("index maintenance failed for document {id} in {collection}: {} index(es) failed", .failures.len())]
    IndexMaintenance {
        /// Collection of the mutated document.
        collection: String,
        /// Logical id of the mutated document.
        id: String,
        /// Per-index failures; the remaining indexes were maintained.
        failures: Vec<IndexFailure>,
    },

    /// Change feed evicted events a processor has not handled yet.
    #[error("change feed gap: processor at {cursor}, oldest retained event is {next}")]
    ChangeFeedGap {
        /// Last sequence the processor handled.
        cursor: u64,
        /// Oldest sequence still in history.
        next: u64,
    },

    /// Operation is not permitted on a reserved collection.
    #[error("collection {name} is reserved for metadata")]
    SystemCollection {
        /// Name of the collection.
        name: String,
    },
}

/// Failure of a single index during mutation maintenance.
#[derive(Debug)]
pub struct IndexFailure {
    /// Name of the failed index.
    pub index_name: String,
    /// What went wrong.
    pub error: CoreError,
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid predicate error.
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            message: message.into(),
        }
    }

    /// Creates a collection not found error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Creates a document not found error.
    pub fn document_not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DocumentNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Returns true for the not-found family.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CollectionNotFound { .. }
                | Self::DocumentNotFound { .. }
                | Self::CursorNotFound { .. }
        )
    }

    /// Returns true for the validation family.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidPredicate { .. }
                | Self::NoMatchingIndex { .. }
                | Self::SystemCollection { .. }
        )
    }

    /// Returns true if redelivering the same mutation may succeed.
    ///
    /// Integrity violations are never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::IndexMaintenance { failures, .. } => {
                failures.iter().all(|f| f.error.is_retryable())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colonnade_storage::StorageError;

    #[test]
    fn classification() {
        assert!(CoreError::collection_not_found("book").is_not_found());
        assert!(CoreError::validation("missing id").is_validation());
        assert!(!CoreError::validation("missing id").is_retryable());
    }

    #[test]
    fn maintenance_retryable_only_if_all_failures_are() {
        let transient = || IndexFailure {
            index_name: "book__genre".into(),
            error: StorageError::Unavailable("throttled".into()).into(),
        };
        let err = CoreError::IndexMaintenance {
            collection: "book".into(),
            id: "1".into(),
            failures: vec![transient(), transient()],
        };
        assert!(err.is_retryable());

        let err = CoreError::IndexMaintenance {
            collection: "book".into(),
            id: "1".into(),
            failures: vec![
                transient(),
                IndexFailure {
                    index_name: "book__title".into(),
                    error: CoreError::validation("separator in value"),
                },
            ],
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn maintenance_message_counts_failures() {
        let err = CoreError::IndexMaintenance {
            collection: "book".into(),
            id: "7".into(),
            failures: vec![IndexFailure {
                index_name: "book__genre".into(),
                error: CoreError::validation("x"),
            }],
        };
        assert_eq!(
            err.to_string(),
            "index maintenance failed for document 7 in book: 1 index(es) failed"
        );
    }
}
