//! # Colonnade Storage
//!
//! Record store contract and implementations for Colonnade.
//!
//! This crate provides the lowest-level storage abstraction: a key-value
//! table addressed by `(partition_key, sort_key)` plus one global projection
//! keyed by `(sort_key, sort_value)` that supports exact, prefix, range and
//! full scans. Stores are **opaque** - payloads are bytes and the store never
//! interprets them.
//!
//! ## Design Principles
//!
//! - Point `get` / `put` / `delete` are atomic per record
//! - `put` overwrites whatever lives at the same `(partition_key, sort_key)`
//! - Scans are ordered by `(sort_value, partition_key)` and resumable from an
//!   exclusive-start record
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral tables
//!
//! ## Example
//!
//! ```rust
//! use colonnade_storage::{InMemoryStore, Record, RecordStore};
//!
//! let store = InMemoryStore::new();
//! store.put(Record::new("book#1", "book", "1")).unwrap();
//! let page = store.scan_all("book", None, 10).unwrap();
//! assert_eq!(page.records.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod record;

pub use backend::RecordStore;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use record::{Page, Record, RecordKey};
