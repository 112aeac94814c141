//! Database facade.

use crate::change_feed::{CatchUp, ChangeEventType, ChangeFeed, ChangeFeedProcessor};
use crate::config::{Config, TriggerMode};
use crate::cursor::{CursorResolver, QueryPage};
use crate::encoding::{decode_payload, document_id, partition_key, KeyEncoder};
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexEngine, MaintenanceReport, Mutation};
use crate::model::{is_system_collection, Collection, Index};
use crate::query::{select_index, Predicate, PredicateCompiler, ScanPlan};
use crate::registry::{InMemoryRegistry, MetadataRegistry, TableRegistry};
use chrono::{SecondsFormat, Utc};
use colonnade_storage::{InMemoryStore, RecordStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Field stamped with the creation time of a document.
pub const CREATION_DATE_TIME: &str = "creation_date_time";

/// Field stamped with the time of the last update of a document.
pub const UPDATE_DATE_TIME: &str = "update_date_time";

/// The main database handle.
///
/// `Database` ties a record store and a metadata registry to the engine:
/// - Collection and index management, including index backfill
/// - Document create/read/update/delete with index maintenance
/// - Paged queries through secondary indexes
///
/// # Index maintenance
///
/// With [`TriggerMode::Synchronous`] every document write maintains the
/// indexes before returning. With [`TriggerMode::ChangeFeed`] writes only
/// touch base records and publish on [`Database::change_feed`]; indexes
/// catch up on [`Database::process_change_feed`].
///
/// ```rust,ignore
/// use colonnade_core::{Collection, Database, Index, Predicate};
/// use serde_json::json;
///
/// let db = Database::open_in_memory();
/// db.create_collection(Collection::new("book", "isbn"))?;
/// db.create_index(Index::new("book", ["category.name"])?)?;
///
/// db.create_document("book", json!({"isbn": "1", "category": {"name": "thriller"}}))?;
/// let page = db.query("book", &Predicate::eq("category.name", "thriller"), None, None, 10)?;
/// assert_eq!(page.documents.len(), 1);
/// ```
pub struct Database {
    config: Config,
    store: Arc<dyn RecordStore>,
    registry: Arc<dyn MetadataRegistry>,
    feed: ChangeFeed,
    processor: ChangeFeedProcessor,
}

impl Database {
    /// Creates a database over explicit collaborators.
    pub fn open(
        store: Arc<dyn RecordStore>,
        registry: Arc<dyn MetadataRegistry>,
        config: Config,
    ) -> Self {
        let feed = ChangeFeed::retaining(config.feed_history);
        Self {
            config,
            store,
            registry,
            feed,
            processor: ChangeFeedProcessor::new(),
        }
    }

    /// Creates a database whose metadata lives in the same store.
    pub fn open_with_table_registry(store: Arc<dyn RecordStore>, config: Config) -> Self {
        let registry = Arc::new(TableRegistry::new(Arc::clone(&store)));
        Self::open(store, registry, config)
    }

    /// Creates a fresh in-memory database with default configuration.
    pub fn open_in_memory() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a fresh in-memory database.
    pub fn with_config(config: Config) -> Self {
        Self::open(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryRegistry::new()),
            config,
        )
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the record store.
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Returns the metadata registry.
    pub fn registry(&self) -> &dyn MetadataRegistry {
        self.registry.as_ref()
    }

    /// Returns the change feed.
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn encoder(&self) -> KeyEncoder {
        KeyEncoder::new(self.config.separator)
    }

    fn engine(&self) -> IndexEngine<'_> {
        IndexEngine::new(self.store.as_ref(), self.encoder())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Registers a collection.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `SystemCollection` for an invalid or
    /// conflicting definition.
    pub fn create_collection(&self, collection: Collection) -> CoreResult<Collection> {
        let collection = self.registry.register_collection(collection)?;
        info!(collection = %collection.name, "collection registered");
        Ok(collection)
    }

    /// Looks up a user collection.
    ///
    /// # Errors
    ///
    /// Returns `SystemCollection` for a reserved name and
    /// `CollectionNotFound` for an unknown one.
    pub fn collection(&self, name: &str) -> CoreResult<Collection> {
        if is_system_collection(name) {
            return Err(CoreError::SystemCollection {
                name: name.to_owned(),
            });
        }
        self.registry
            .get_collection(name)?
            .ok_or_else(|| CoreError::collection_not_found(name))
    }

    /// Lists the indexes of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub fn indexes(&self, collection: &str) -> CoreResult<Vec<Index>> {
        self.registry.list_indexes(collection)
    }

    /// Registers an index and writes its records for every existing
    /// document.
    ///
    /// Registering an index that already exists returns it and rewrites its
    /// records, which is harmless.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound`, `Validation` for an invalid or
    /// conflicting definition, or a storage error during backfill.
    pub fn create_index(&self, index: Index) -> CoreResult<Index> {
        let collection = self.collection(&index.collection_name)?;
        let index = self.registry.register_index(index)?;
        self.engine().rebuild_index(&collection, &index)?;
        Ok(index)
    }

    /// Unregisters an index and deletes its records.
    ///
    /// Returns the removed definition, or `None` if no such index existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry or store fails.
    pub fn drop_index(&self, collection: &str, index_name: &str) -> CoreResult<Option<Index>> {
        let Some(index) = self.registry.remove_index(collection, index_name)? else {
            return Ok(None);
        };
        self.engine().drop_index_records(&index)?;
        Ok(Some(index))
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Reads a document by id.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if no base record exists.
    pub fn get_document(&self, collection: &str, id: &str) -> CoreResult<Value> {
        let collection = self.collection(collection)?;
        self.load(&collection, id)?
            .ok_or_else(|| CoreError::document_not_found(&collection.name, id))
    }

    fn load(&self, collection: &Collection, id: &str) -> CoreResult<Option<Value>> {
        let record = self
            .store
            .get(&partition_key(&collection.name, id), &collection.name)?;
        match record.and_then(|r| r.payload) {
            Some(payload) => decode_payload(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Creates a document and returns it as stored.
    ///
    /// Collections with `auto_generate_id` get a UUID for documents without
    /// id. `creation_date_time` is stamped.
    ///
    /// # Errors
    ///
    /// - `Validation` if the document is not an object, lacks its id, or a
    ///   document with that id exists
    /// - `IndexMaintenance` if some indexes could not be maintained; the
    ///   document itself is stored
    pub fn create_document(&self, collection: &str, mut document: Value) -> CoreResult<Value> {
        let collection = self.collection(collection)?;
        let fields = document
            .as_object_mut()
            .ok_or_else(|| CoreError::validation("document must be a JSON object"))?;
        if collection.auto_generate_id && !fields.contains_key(&collection.id_key) {
            fields.insert(
                collection.id_key.clone(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
        fields.insert(CREATION_DATE_TIME.to_owned(), Value::String(now()));

        let id = document_id(&collection, &document)?;
        if self.load(&collection, &id)?.is_some() {
            return Err(CoreError::validation(format!(
                "document {id} already exists in {}",
                collection.name
            )));
        }

        self.write(&collection, None, document.clone())?;
        Ok(document)
    }

    /// Replaces a document and returns it as stored.
    ///
    /// `update_date_time` is stamped.
    ///
    /// # Errors
    ///
    /// - `DocumentNotFound` if the document does not exist
    /// - `Validation` if the document is not an object or lacks its id
    /// - `IndexMaintenance` if some indexes could not be maintained
    pub fn update_document(&self, collection: &str, mut document: Value) -> CoreResult<Value> {
        let collection = self.collection(collection)?;
        document
            .as_object_mut()
            .ok_or_else(|| CoreError::validation("document must be a JSON object"))?
            .insert(UPDATE_DATE_TIME.to_owned(), Value::String(now()));

        let id = document_id(&collection, &document)?;
        let old = self
            .load(&collection, &id)?
            .ok_or_else(|| CoreError::document_not_found(&collection.name, &id))?;

        self.write(&collection, Some(old), document.clone())?;
        Ok(document)
    }

    /// Deletes a document with its index records and returns its last
    /// image.
    ///
    /// # Errors
    ///
    /// - `DocumentNotFound` if the document does not exist
    /// - `IndexMaintenance` if some index records could not be deleted;
    ///   the base record is kept so the delete can be retried
    pub fn delete_document(&self, collection: &str, id: &str) -> CoreResult<Value> {
        let collection = self.collection(collection)?;
        let old = self
            .load(&collection, id)?
            .ok_or_else(|| CoreError::document_not_found(&collection.name, id))?;
        let pk = partition_key(&collection.name, id);

        match self.config.trigger_mode {
            TriggerMode::Synchronous => {
                let indexes = self.registry.list_indexes(&collection.name)?;
                self.engine()
                    .apply(&collection, &indexes, &Mutation::Delete { old: old.clone() })?
                    .into_result()?;
            }
            TriggerMode::ChangeFeed => {
                self.store.delete(&pk, &collection.name)?;
                self.feed.publish(
                    ChangeEventType::Remove,
                    pk,
                    collection.name.clone(),
                    Some(old.clone()),
                    None,
                );
            }
        }
        Ok(old)
    }

    /// Writes the base record, then maintains indexes or publishes.
    ///
    /// The new image is encoded against every index first, so a document
    /// no index can hold is rejected before anything is stored.
    fn write(&self, collection: &Collection, old: Option<Value>, new: Value) -> CoreResult<()> {
        let encoder = self.encoder();
        let base = encoder.encode_base(collection, &new)?;
        let indexes = self.registry.list_indexes(&collection.name)?;
        for index in &indexes {
            encoder.encode_index(collection, index, &new)?;
        }

        let pk = base.partition_key.clone();
        self.store.put(base)?;
        debug!(partition_key = %pk, "base record written");

        match self.config.trigger_mode {
            TriggerMode::Synchronous => {
                let mutation = Mutation::from_images(old, Some(new))?;
                self.engine()
                    .apply(collection, &indexes, &mutation)?
                    .into_result()?;
            }
            TriggerMode::ChangeFeed => {
                let event_type = if old.is_some() {
                    ChangeEventType::Modify
                } else {
                    ChangeEventType::Insert
                };
                self.feed
                    .publish(event_type, pk, collection.name.clone(), old, Some(new));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Index maintenance
    // ========================================================================

    /// Maintains the indexes of `collection` for one mutation.
    ///
    /// This is the single entry point of both trigger paths. Applying the
    /// same images again converges to the same state.
    ///
    /// # Errors
    ///
    /// - `Validation` if both images are absent or lack their id
    /// - `InconsistentIndex` on an identity collision
    /// - `IndexMaintenance` if some indexes failed; the others were
    ///   maintained
    pub fn apply_mutation(
        &self,
        collection: &str,
        old: Option<Value>,
        new: Option<Value>,
    ) -> CoreResult<MaintenanceReport> {
        let mutation = Mutation::from_images(old, new)?;
        self.apply(collection, &mutation)
    }

    fn apply(&self, collection: &str, mutation: &Mutation) -> CoreResult<MaintenanceReport> {
        let collection = self
            .registry
            .get_collection(collection)?
            .ok_or_else(|| CoreError::collection_not_found(collection))?;
        let indexes = self.registry.list_indexes(&collection.name)?;
        self.engine()
            .apply(&collection, &indexes, mutation)?
            .into_result()
    }

    /// Applies every pending change-feed event.
    ///
    /// # Errors
    ///
    /// Returns the first maintenance error; the failed event and those after
    /// it are delivered again by the next call.
    pub fn process_change_feed(&self) -> CoreResult<CatchUp> {
        self.processor.catch_up(&self.feed, |collection, mutation| {
            self.apply(collection, &mutation).map(|_| ())
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Compiles `predicate` and returns the plan with the index it scans.
    ///
    /// Without `index_name` an index is selected from the predicate's
    /// fields.
    ///
    /// # Errors
    ///
    /// - `CollectionNotFound` for an unknown collection
    /// - `Validation` for an unknown `index_name`
    /// - `NoMatchingIndex` if no index serves the predicate
    /// - `InvalidPredicate` if the predicate is malformed or does not fit
    ///   the index
    pub fn plan(
        &self,
        collection: &str,
        predicate: &Predicate,
        index_name: Option<&str>,
    ) -> CoreResult<(ScanPlan, Option<Index>)> {
        self.plan_for(&self.collection(collection)?, predicate, index_name)
    }

    fn plan_for(
        &self,
        collection: &Collection,
        predicate: &Predicate,
        index_name: Option<&str>,
    ) -> CoreResult<(ScanPlan, Option<Index>)> {
        let index = if predicate.is_any_match() {
            None
        } else {
            let indexes = self.registry.list_indexes(&collection.name)?;
            let chosen = match index_name {
                Some(name) => indexes.iter().find(|i| i.name() == name).ok_or_else(|| {
                    CoreError::validation(format!(
                        "index {name} does not exist on {}",
                        collection.name
                    ))
                })?,
                None => select_index(&indexes, predicate)?.ok_or_else(|| {
                    CoreError::NoMatchingIndex {
                        collection: collection.name.clone(),
                        fields: predicate.fields(),
                    }
                })?,
            };
            Some(chosen.clone())
        };

        let plan = PredicateCompiler::new(self.config.separator).compile(
            collection,
            predicate,
            index.as_ref(),
        )?;
        debug!(collection = %collection.name, %plan, "query planned");
        Ok((plan, index))
    }

    /// Runs one page of a query.
    ///
    /// `start_from` is the `next_start_from` of the previous page. A
    /// `limit` of 0 uses the configured default page size.
    ///
    /// # Errors
    ///
    /// See [`Database::plan`]; additionally `CursorNotFound` when the
    /// cursor document is gone under [`crate::MissingCursorPolicy::Fail`].
    pub fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
        index_name: Option<&str>,
        start_from: Option<&str>,
        limit: usize,
    ) -> CoreResult<QueryPage> {
        let collection = self.collection(collection)?;
        let (plan, index) = self.plan_for(&collection, predicate, index_name)?;
        CursorResolver::new(self.store.as_ref(), self.encoder(), self.config.missing_cursor)
            .fetch_page(
                &collection,
                predicate,
                &plan,
                index.as_ref(),
                start_from,
                self.config.page_size(limit),
            )
    }

    /// Runs a query to exhaustion, following cursors page by page.
    ///
    /// # Errors
    ///
    /// See [`Database::query`].
    pub fn query_all(
        &self,
        collection: &str,
        predicate: &Predicate,
        index_name: Option<&str>,
        page_size: usize,
    ) -> CoreResult<Vec<Value>> {
        let mut documents = Vec::new();
        let mut start_from: Option<String> = None;
        loop {
            let page = self.query(
                collection,
                predicate,
                index_name,
                start_from.as_deref(),
                page_size,
            )?;
            documents.extend(page.documents);
            match page.next_start_from {
                Some(next) => start_from = Some(next),
                None => return Ok(documents),
            }
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
