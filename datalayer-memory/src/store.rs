//! In-memory data service.
//!
//! This module provides [`InMemoryDataService`], a [`DataService`] that keeps records in
//! named, ordered collections held in memory, and its builder.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use log::{debug, trace, warn};

use datalayer_core::{
    error::{DataServiceError, DataServiceResult},
    event::{ChangeEvent, ChangeKind, ChangeNotifier, DEFAULT_EVENT_NAME},
    filter::{FilterGenerator, IdFilterGenerator, RecordFilter, match_all, match_id},
    id::{IdGenerator, UuidIdGenerator},
    query::{DisjunctiveIdQueryBuilder, IdQueryBuilder, PassthroughIdQueryBuilder, Query},
    record::Record,
    service::{DEFAULT_COLLECTION, DataService, DataServiceBuilder, Saved},
};

use crate::{evaluator::StructuredFilterGenerator, registry::CollectionRegistry};

/// Record service backed by in-memory collections.
///
/// # Thread Safety
///
/// `InMemoryDataService` is cloneable and uses `Arc`-wrapped internal state, allowing it
/// to be shared across async tasks. Clones share the same collections. Every collection
/// has its own async read-write lock; saves and removes hold the write lock for the whole
/// match-and-mutate step, so no two records of a collection ever share a primary
/// identifier.
///
/// Change events are emitted after the lock is released. Events from concurrent writers
/// may therefore arrive in a different order from the mutations themselves.
///
/// # Performance
///
/// Queries scan every record of the collection (no indexing).
///
/// # Example
///
/// ```ignore
/// use datalayer_memory::InMemoryDataService;
/// use datalayer_core::service::{DataService, DataServiceBuilder};
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = InMemoryDataService::builder()
///         .structured_queries()
///         .build()
///         .await?;
///
///     service.save(doc! { "msg": "hello" }.into(), None).await?;
///
///     let found = service
///         .fetch(doc! { "msg": { "$regex": "^hel" } }.into(), None)
///         .await?;
///     assert_eq!(found.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryDataService {
    service_name: String,
    collections: Arc<CollectionRegistry>,
    notification: Option<Arc<ChangeNotifier>>,
    event_name: String,
    use_independent_ids: bool,
    filter_generator: Option<Arc<dyn FilterGenerator>>,
    id_query_builder: Arc<dyn IdQueryBuilder>,
    id_generator: Arc<dyn IdGenerator>,
}

impl InMemoryDataService {
    /// Creates a service with default options and an empty default collection.
    pub fn new() -> Self {
        InMemoryDataServiceBuilder::default().into_service()
    }

    /// Creates a builder for constructing an `InMemoryDataService` with custom options.
    pub fn builder() -> InMemoryDataServiceBuilder {
        InMemoryDataServiceBuilder::default()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Whether saved records get an independent (secondary) identifier.
    pub fn use_independent_ids(&self) -> bool {
        self.use_independent_ids
    }

    /// Turns independent identifiers on or off for subsequent saves.
    pub fn set_use_independent_ids(&mut self, use_independent_ids: bool) {
        self.use_independent_ids = use_independent_ids;
    }

    /// Registers a new collection.
    ///
    /// # Errors
    ///
    /// Returns [`DataServiceError::CollectionAlreadyExists`] if the name is taken.
    pub async fn create_collection(&self, name: &str, records: Vec<Record>) -> DataServiceResult<()> {
        self.collections.create_collection(name, records).await?;
        debug!("{}: created collection {}", self.service_name, name);

        Ok(())
    }

    /// Drops a collection and returns its records. The default collection is emptied.
    ///
    /// No change events are emitted for the dropped records.
    pub async fn drop_collection(&self, name: &str) -> DataServiceResult<Vec<Record>> {
        let records = self.collections.drop_collection(name).await?;
        debug!("{}: dropped collection {} ({} records)", self.service_name, name, records.len());

        Ok(records)
    }

    pub async fn list_collections(&self) -> Vec<String> {
        self.collections.list_collections().await
    }

    fn compile(&self, query: &Query) -> DataServiceResult<RecordFilter> {
        match &self.filter_generator {
            Some(generator) => generator.compile(query),
            None => match query {
                Query::All => Ok(match_all()),
                Query::Id(id) => Ok(match_id(id.as_str())),
                query => {
                    warn!("{}: no filter generator for query {:?}", self.service_name, query);
                    Err(DataServiceError::UnsupportedQuery(format!(
                        "no filter generator configured for {query:?}"
                    )))
                }
            },
        }
    }

    /// Selects the records matching `query`, in collection order.
    fn select(&self, records: &[Record], query: &Query) -> DataServiceResult<Vec<Record>> {
        match query {
            Query::List(queries) => {
                let mut selected = Vec::new();

                for (index, query) in queries.iter().enumerate() {
                    let found = self
                        .select(records, query)
                        .map_err(|err| DataServiceError::subquery(index, err))?;
                    selected.extend(found);
                }

                Ok(selected)
            }
            query if query.is_empty() => Ok(records.to_vec()),
            Query::Id(_) => {
                let query = self.id_query_builder.build_id_query(query.clone());
                self.filter(records, &query)
            }
            query => self.filter(records, query),
        }
    }

    fn filter(&self, records: &[Record], query: &Query) -> DataServiceResult<Vec<Record>> {
        let filter = self.compile(query)?;

        Ok(records
            .iter()
            .filter(|record| filter(record))
            .cloned()
            .collect())
    }

    fn notify(&self, record: &Record, kind: ChangeKind, collection: &str) {
        if let Some(notification) = &self.notification {
            notification.emit(
                &self.event_name,
                &ChangeEvent::new(record.clone(), kind, collection),
            );
        }
    }
}

impl Default for InMemoryDataService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryDataService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDataService")
            .field("service_name", &self.service_name)
            .field("collections", &self.collections)
            .field("notification", &self.notification)
            .field("event_name", &self.event_name)
            .field("use_independent_ids", &self.use_independent_ids)
            .field("filter_generator", &self.filter_generator.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn fetch(&self, query: Query, collection: Option<&str>) -> DataServiceResult<Vec<Record>> {
        let records = self.collections.resolve(collection).await?;
        let records = records.read().await;

        let selected = self.select(&records, &query)?;
        trace!(
            "{}: fetched {} of {} records from {}",
            self.service_name,
            selected.len(),
            records.len(),
            collection.unwrap_or(DEFAULT_COLLECTION),
        );

        Ok(selected)
    }

    async fn save(&self, mut record: Record, collection: Option<&str>) -> DataServiceResult<Saved> {
        let name = collection.unwrap_or(DEFAULT_COLLECTION);
        let records = self.collections.resolve(collection).await?;

        let kind = {
            let mut records = records.write().await;

            let kind = match record.primary_id() {
                Some(_) => ChangeKind::Update,
                None => {
                    record.set_primary_id(self.generate_id());
                    ChangeKind::Create
                }
            };

            let existing = records
                .iter()
                .position(|stored| stored.same_primary_id(&record));

            if self.use_independent_ids && record.secondary_id().is_none() {
                let secondary_id = existing
                    .and_then(|index| records[index].secondary_id())
                    .unwrap_or_else(|| self.generate_id());
                record.set_secondary_id(secondary_id);
            }

            match existing {
                Some(index) => records[index] = record.clone(),
                None => records.push(record.clone()),
            }

            kind
        };

        debug!(
            "{}: {} {} in {}",
            self.service_name,
            kind,
            record.primary_id().unwrap_or_default(),
            name,
        );
        self.notify(&record, kind, name);

        Ok(Saved { record, kind })
    }

    async fn remove(&self, query: Query, collection: Option<&str>) -> DataServiceResult<Query> {
        let name = collection.unwrap_or(DEFAULT_COLLECTION);
        let records = self.collections.resolve(collection).await?;

        let removed = {
            let mut records = records.write().await;
            let matched = self.select(&records, &query)?;
            let mut removed = Vec::with_capacity(matched.len());

            for found in matched {
                let anonymous = found.primary_id().is_none() && found.secondary_id().is_none();

                if let Some(index) = records.iter().position(|stored| {
                    if anonymous {
                        stored == &found
                    } else {
                        stored.shares_identity(&found)
                    }
                }) {
                    removed.push(records.remove(index));
                }
            }

            removed
        };

        debug!("{}: removed {} records from {}", self.service_name, removed.len(), name);

        for record in &removed {
            self.notify(record, ChangeKind::Delete, name);
        }

        Ok(query)
    }

    fn create_id_query(&self, id: Query) -> Query {
        self.id_query_builder.build_id_query(id)
    }

    fn generate_id(&self) -> String {
        self.id_generator.generate_id()
    }
}

/// Builder for constructing [`InMemoryDataService`] instances.
///
/// Defaults: an empty default collection, no notification, event name
/// [`DEFAULT_EVENT_NAME`], independent identifiers on, [`IdFilterGenerator`],
/// [`PassthroughIdQueryBuilder`] and [`UuidIdGenerator`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use datalayer_memory::InMemoryDataService;
/// use datalayer_core::{event::ChangeNotifier, service::DataServiceBuilder};
///
/// let notifier = Arc::new(ChangeNotifier::new());
/// let service = InMemoryDataService::builder()
///     .service_name("notes")
///     .notification(notifier.clone())
///     .use_independent_ids(false)
///     .build()
///     .await?;
/// ```
pub struct InMemoryDataServiceBuilder {
    service_name: String,
    collections: HashMap<String, Vec<Record>>,
    notification: Option<Arc<ChangeNotifier>>,
    event_name: String,
    use_independent_ids: bool,
    filter_generator: Option<Arc<dyn FilterGenerator>>,
    id_query_builder: Arc<dyn IdQueryBuilder>,
    id_generator: Arc<dyn IdGenerator>,
}

impl Default for InMemoryDataServiceBuilder {
    fn default() -> Self {
        Self {
            service_name: "in-memory-data-service".to_string(),
            collections: HashMap::new(),
            notification: None,
            event_name: DEFAULT_EVENT_NAME.to_string(),
            use_independent_ids: true,
            filter_generator: Some(Arc::new(IdFilterGenerator)),
            id_query_builder: Arc::new(PassthroughIdQueryBuilder),
            id_generator: Arc::new(UuidIdGenerator),
        }
    }
}

impl InMemoryDataServiceBuilder {
    /// Sets the name used for this service in log messages.
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Adds (or replaces) an initial collection.
    pub fn collection(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.collections.insert(name.into(), records);
        self
    }

    /// Sets all initial collections, keyed by name.
    pub fn collections(mut self, collections: HashMap<String, Vec<Record>>) -> Self {
        self.collections = collections;
        self
    }

    /// Sets the notifier change events are published to.
    pub fn notification(mut self, notification: Arc<ChangeNotifier>) -> Self {
        self.notification = Some(notification);
        self
    }

    /// Sets the event name change events are published under.
    pub fn event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }

    /// Whether saved records get an independent (secondary) identifier.
    pub fn use_independent_ids(mut self, use_independent_ids: bool) -> Self {
        self.use_independent_ids = use_independent_ids;
        self
    }

    pub fn filter_generator(mut self, filter_generator: impl FilterGenerator + 'static) -> Self {
        self.filter_generator = Some(Arc::new(filter_generator));
        self
    }

    /// Removes the filter generator. Only empty and raw identifier queries are then
    /// supported; anything else fails with [`DataServiceError::UnsupportedQuery`].
    pub fn without_filter_generator(mut self) -> Self {
        self.filter_generator = None;
        self
    }

    pub fn id_query_builder(mut self, id_query_builder: impl IdQueryBuilder + 'static) -> Self {
        self.id_query_builder = Arc::new(id_query_builder);
        self
    }

    pub fn id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Arc::new(id_generator);
        self
    }

    /// Uses [`StructuredFilterGenerator`] together with [`DisjunctiveIdQueryBuilder`].
    pub fn structured_queries(self) -> Self {
        self.filter_generator(StructuredFilterGenerator)
            .id_query_builder(DisjunctiveIdQueryBuilder)
    }

    fn into_service(self) -> InMemoryDataService {
        InMemoryDataService {
            service_name: self.service_name,
            collections: Arc::new(CollectionRegistry::new(self.collections)),
            notification: self.notification,
            event_name: self.event_name,
            use_independent_ids: self.use_independent_ids,
            filter_generator: self.filter_generator,
            id_query_builder: self.id_query_builder,
            id_generator: self.id_generator,
        }
    }
}

#[async_trait]
impl DataServiceBuilder for InMemoryDataServiceBuilder {
    type Service = InMemoryDataService;

    /// Builds and returns a new [`InMemoryDataService`].
    ///
    /// # Errors
    ///
    /// Returns [`DataServiceError::Initialization`] if the event name is empty.
    async fn build(self) -> DataServiceResult<Self::Service> {
        if self.event_name.is_empty() {
            return Err(DataServiceError::Initialization(
                "event name must not be empty".to_string(),
            ));
        }

        Ok(self.into_service())
    }
}
