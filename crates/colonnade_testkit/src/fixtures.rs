//! Test fixtures and database helpers.
//!
//! Provides the `book` collection used throughout the tests and
//! convenience functions for inspecting physical records.

use colonnade_core::{Collection, Config, Database, InMemoryRegistry, Index};
use colonnade_storage::{InMemoryStore, Record, RecordStore};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// A test database over an in-memory store the test can inspect.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The store under the database.
    pub store: Arc<InMemoryStore>,
}

impl TestDatabase {
    /// Creates an empty in-memory test database.
    pub fn memory() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty in-memory test database with `config`.
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let db = Database::open(store.clone(), Arc::new(InMemoryRegistry::new()), config);
        Self { db, store }
    }

    /// Creates a test database with the `book` collection and its indexes.
    pub fn books() -> Self {
        Self::books_with_config(Config::default())
    }

    /// Creates a `book` test database with `config`.
    pub fn books_with_config(config: Config) -> Self {
        let test = Self::with_config(config);
        setup_books(&test.db);
        test
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// `book` collection keyed by `isbn`.
pub fn book_collection() -> Collection {
    Collection::new("book", "isbn")
}

/// `book__category.name`, OPTIMIZE_READ.
pub fn category_index() -> Index {
    Index::new("book", ["category.name"]).expect("valid index")
}

/// `book__author.name__rating`, OPTIMIZE_READ.
pub fn author_rating_index() -> Index {
    Index::new("book", ["author.name", "rating"]).expect("valid index")
}

/// Registers the `book` collection with the category and author/rating
/// indexes.
pub fn setup_books(db: &Database) {
    db.create_collection(book_collection())
        .expect("Failed to create book collection");
    db.create_index(category_index())
        .expect("Failed to create category index");
    db.create_index(author_rating_index())
        .expect("Failed to create author/rating index");
}

/// Builds a book document; `None` fields are left out.
pub fn book(
    isbn: &str,
    category: Option<&str>,
    author: Option<&str>,
    rating: Option<&str>,
) -> Value {
    let mut doc = Map::new();
    doc.insert("isbn".into(), json!(isbn));
    if let Some(category) = category {
        doc.insert("category".into(), json!({ "name": category }));
    }
    if let Some(author) = author {
        doc.insert("author".into(), json!({ "name": author }));
    }
    if let Some(rating) = rating {
        doc.insert("rating".into(), json!(rating));
    }
    Value::Object(doc)
}

/// Reads every record of a sort-key group, paging through the store.
pub fn index_records(store: &dyn RecordStore, sort_key: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut start_after: Option<Record> = None;
    loop {
        let page = store
            .scan_all(sort_key, start_after.as_ref(), 7)
            .expect("Failed to scan store");
        records.extend(page.records.iter().cloned());
        start_after = page.records.last().cloned();
        if !page.has_more || start_after.is_none() {
            return records;
        }
    }
}

/// The `isbn` of each document, in order.
pub fn ids(documents: &[Value]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|d| d["isbn"].as_str().map(str::to_owned))
        .collect()
}

/// Writes `contents` to a temporary JSON file.
pub fn fixture_file(contents: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    serde_json::to_writer_pretty(&mut file, contents).expect("Failed to write fixture");
    file.flush().expect("Failed to flush fixture");
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn books_fixture() {
        let db = TestDatabase::books();
        assert_eq!(db.indexes("book").unwrap().len(), 2);

        db.create_document("book", book("1", Some("thriller"), Some("Larsson"), Some("5")))
            .unwrap();
        assert_eq!(index_records(db.store.as_ref(), "book#category.name").len(), 1);
        assert_eq!(index_records(db.store.as_ref(), "book#author.name#rating").len(), 1);
    }

    #[test]
    fn book_leaves_out_missing_fields() {
        let doc = book("1", None, Some("Larsson"), None);
        assert!(doc.get("category").is_none());
        assert_eq!(doc["author"]["name"], "Larsson");
    }

    #[test]
    fn fixture_file_round_trip() {
        let file = fixture_file(&json!({"collections": []}));
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("collections"));
    }
}
