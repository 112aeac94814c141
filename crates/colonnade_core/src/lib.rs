//! # Colonnade Core
//!
//! Secondary indexes for document collections kept in a single key-value
//! table with one global range-scannable projection.
//!
//! This crate provides:
//! - Collection and index metadata with derived index names
//! - Key encoding of base and index records
//! - Predicate compilation into exact, prefix, bounded and full scans
//! - Index maintenance for create/update/delete, idempotent under
//!   redelivery, triggered synchronously or from a change feed
//! - Logical-id pagination cursors
//!
//! ```rust,ignore
//! use colonnade_core::{Collection, Database, Index, Predicate};
//! use serde_json::json;
//!
//! let db = Database::open_in_memory();
//! db.create_collection(Collection::new("book", "isbn"))?;
//! db.create_index(Index::new("book", ["author.name", "rating"])?)?;
//!
//! let (plan, _) = db.plan(
//!     "book",
//!     &Predicate::and([
//!         Predicate::eq("author.name", "Larsson"),
//!         Predicate::range("rating", "3", "7"),
//!     ]),
//!     None,
//! )?;
//! println!("{plan}"); // BoundedScan(book#author.name#rating, "Larsson#3", "Larsson#7")
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod change_feed;
mod config;
pub mod cursor;
mod database;
pub mod encoding;
mod error;
pub mod index;
pub mod model;
pub mod query;
pub mod registry;

pub use change_feed::{CatchUp, ChangeEvent, ChangeEventType, ChangeFeed, ChangeFeedProcessor};
pub use config::{Config, MissingCursorPolicy, SeparatorPolicy, TriggerMode};
pub use cursor::{CursorResolver, QueryPage};
pub use database::{Database, CREATION_DATE_TIME, UPDATE_DATE_TIME};
pub use encoding::{KeyEncoder, KeyValue};
pub use error::{CoreError, CoreResult, IndexFailure};
pub use index::{IndexAction, IndexEngine, MaintenanceReport, Mutation};
pub use model::{
    AttributeConstraint, AttributeDefinition, AttributeType, Collection, Index,
    IndexConfiguration,
};
pub use query::{compile, select_index, Predicate, PredicateCompiler, ScanPlan};
pub use registry::{InMemoryRegistry, MetadataRegistry, TableRegistry};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
