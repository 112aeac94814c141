//! Fixture loading.
//!
//! A fixture is a JSON file:
//!
//! ```json
//! {
//!   "collections": [{"name": "book", "id_key": "isbn"}],
//!   "indexes": [{"collection_name": "book", "conditions": ["category.name"]}],
//!   "documents": {"book": [{"isbn": "1", "category": {"name": "thriller"}}]}
//! }
//! ```
//!
//! Metadata is kept in the loaded store itself, next to the documents.

use colonnade_core::{Collection, Config, CoreError, Database, Index, Predicate};
use colonnade_storage::InMemoryStore;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors while loading a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// Fixture file could not be read.
    #[error("cannot read fixture {path:?}: {source}")]
    Io {
        /// Fixture path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Fixture or predicate is not valid JSON of the expected shape.
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Loading into the database failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Contents of a fixture file.
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    /// Collections to register.
    #[serde(default)]
    pub collections: Vec<Collection>,
    /// Indexes to register.
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Documents per collection, created in order.
    #[serde(default)]
    pub documents: BTreeMap<String, Vec<Value>>,
}

/// A database loaded from a fixture, with its store kept for inspection.
pub struct Loaded {
    /// The store under the database.
    pub store: Arc<InMemoryStore>,
    /// The database.
    pub db: Database,
}

impl Fixture {
    /// Reads a fixture file.
    pub fn read(path: &Path) -> Result<Self, FixtureError> {
        let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Registers the fixture's metadata and creates its documents.
    pub fn load(self) -> Result<Loaded, FixtureError> {
        let store = Arc::new(InMemoryStore::new());
        let db = Database::open_with_table_registry(store.clone(), Config::default());

        for collection in self.collections {
            db.create_collection(collection)?;
        }
        for index in self.indexes {
            db.create_index(index)?;
        }
        let mut created = 0;
        for (collection, documents) in self.documents {
            for document in documents {
                db.create_document(&collection, document)?;
                created += 1;
            }
        }
        info!(documents = created, records = store.len(), "fixture loaded");
        Ok(Loaded { store, db })
    }
}

/// Reads and loads a fixture file.
pub fn load(path: &Path) -> Result<Loaded, FixtureError> {
    Fixture::read(path)?.load()
}

/// Parses a predicate given on the command line.
pub fn parse_predicate(text: &str) -> Result<Predicate, FixtureError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn books() -> Value {
        json!({
            "collections": [{"name": "book", "id_key": "isbn"}],
            "indexes": [
                {"collection_name": "book", "conditions": ["category.name"]},
                {"collection_name": "book", "conditions": ["author.name", "rating"],
                 "configuration": "OPTIMIZE_WRITE"}
            ],
            "documents": {"book": [
                {"isbn": "1", "category": {"name": "thriller"}},
                {"isbn": "2", "author": {"name": "Larsson"}, "rating": "5"}
            ]}
        })
    }

    #[test]
    fn load_books() {
        let fixture: Fixture = serde_json::from_value(books()).unwrap();
        let loaded = fixture.load().unwrap();
        assert_eq!(loaded.db.indexes("book").unwrap().len(), 2);
        assert!(loaded.db.get_document("book", "2").is_ok());
        // 1 collection, 2 index definitions, 2 base records, 2 index records
        assert_eq!(loaded.store.len(), 7);
    }

    #[test]
    fn read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", books()).unwrap();
        let fixture = Fixture::read(file.path()).unwrap();
        assert_eq!(fixture.collections.len(), 1);
        assert_eq!(fixture.documents["book"].len(), 2);
    }

    #[test]
    fn missing_file() {
        let err = Fixture::read(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert!(matches!(err, FixtureError::Io { .. }));
    }

    #[test]
    fn unknown_collection_fails_to_load() {
        let fixture: Fixture =
            serde_json::from_value(json!({"documents": {"film": [{"id": "1"}]}})).unwrap();
        assert!(matches!(fixture.load(), Err(FixtureError::Core(_))));
    }

    #[test]
    fn predicate_wire_format() {
        let predicate = parse_predicate(r#"{"eq":{"field_name":"genre","value":"scifi"}}"#).unwrap();
        assert_eq!(predicate, Predicate::eq("genre", "scifi"));
        assert!(parse_predicate("\"any_match\"").unwrap().is_any_match());
        assert!(parse_predicate("{\"eq\":1}").is_err());
    }
}
