//! # Colonnade Testkit
//!
//! Test utilities for Colonnade.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - Fault-injecting record stores for failure-isolation tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use colonnade_testkit::prelude::*;
//!
//! #[test]
//! fn thriller_is_indexed() {
//!     let db = TestDatabase::books();
//!     db.create_document("book", book("1", Some("thriller"), None, None)).unwrap();
//!     assert_eq!(index_records(db.store(), "book#category.name").len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
