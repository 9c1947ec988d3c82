//! Named collections owned by a single in-memory data service.
//!
//! Each collection is an ordered `Vec<Record>` behind its own async read-write lock, so
//! scans of one collection never wait on writes to another. The registry map itself is
//! locked only while collections are resolved, created or dropped.

use std::{collections::HashMap, sync::Arc};

use mea::rwlock::RwLock;

use datalayer_core::{
    error::{DataServiceError, DataServiceResult},
    record::Record,
    service::DEFAULT_COLLECTION,
};

/// A single collection: an ordered, mutable sequence of records.
pub type SharedCollection = Arc<RwLock<Vec<Record>>>;

/// Registry of named collections. The default collection is always present.
#[derive(Debug)]
pub struct CollectionRegistry {
    collections: RwLock<HashMap<String, SharedCollection>>,
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl CollectionRegistry {
    /// Creates a registry from initial collection contents, adding an empty default
    /// collection if none was supplied.
    pub fn new(initial: HashMap<String, Vec<Record>>) -> Self {
        let mut collections = initial
            .into_iter()
            .map(|(name, records)| (name, Arc::new(RwLock::new(records))))
            .collect::<HashMap<_, _>>();

        collections
            .entry(DEFAULT_COLLECTION.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())));

        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Returns the named collection, or the default collection when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DataServiceError::UnknownCollection`] if no collection has that name.
    pub async fn resolve(&self, name: Option<&str>) -> DataServiceResult<SharedCollection> {
        let name = name.unwrap_or(DEFAULT_COLLECTION);

        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DataServiceError::UnknownCollection(name.to_string()))
    }

    /// Registers a new collection with the given initial records.
    ///
    /// # Errors
    ///
    /// Returns [`DataServiceError::CollectionAlreadyExists`] if the name is taken.
    pub async fn create_collection(&self, name: &str, records: Vec<Record>) -> DataServiceResult<()> {
        let mut collections = self.collections.write().await;

        if collections.contains_key(name) {
            return Err(DataServiceError::CollectionAlreadyExists(name.to_string()));
        }

        collections.insert(name.to_string(), Arc::new(RwLock::new(records)));

        Ok(())
    }

    /// Drops a collection and returns its records.
    ///
    /// The default collection is emptied rather than removed.
    ///
    /// # Errors
    ///
    /// Returns [`DataServiceError::UnknownCollection`] if no collection has that name.
    pub async fn drop_collection(&self, name: &str) -> DataServiceResult<Vec<Record>> {
        let collection = if name == DEFAULT_COLLECTION {
            self.resolve(None).await?
        } else {
            self.collections
                .write()
                .await
                .remove(name)
                .ok_or_else(|| DataServiceError::UnknownCollection(name.to_string()))?
        };

        let mut records = collection.write().await;
        Ok(std::mem::take(&mut *records))
    }

    /// Lists the names of all collections, sorted.
    pub async fn list_collections(&self) -> Vec<String> {
        let mut names = self.collections
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        names
    }
}
