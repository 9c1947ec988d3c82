//! Data service abstraction.
//!
//! The [`DataService`] trait is the uniform asynchronous create/read/update/delete
//! interface every backend implements. Operations take an optional collection name; `None`
//! addresses the backend's default collection.
//!
//! # Example
//!
//! ```ignore
//! use datalayer::prelude::*;
//! use bson::doc;
//!
//! let service = InMemoryDataService::builder().build().await?;
//!
//! let saved = service.save(doc! { "msg": "hello" }.into(), None).await?;
//! let id = saved.record.primary_id().unwrap();
//!
//! let found = service.fetch_one(id.as_str().into(), None).await?;
//! assert_eq!(found.unwrap().get_str("msg"), Some("hello"));
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    error::DataServiceResult,
    event::ChangeKind,
    query::Query,
    record::Record,
};

/// Name of the collection addressed when an operation is given no collection name.
pub const DEFAULT_COLLECTION: &str = "default";

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct Saved {
    /// The record as stored, including any assigned identifiers.
    pub record: Record,
    /// Whether the save created a new record or updated an existing one.
    pub kind: ChangeKind,
}

/// Uniform asynchronous record service.
///
/// # Errors
///
/// Operations reject when the query cannot be compiled or the collection cannot be
/// resolved. Nothing is retried internally.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Returns the records matching `query`, in collection order.
    ///
    /// A [`Query::List`] is answered sub-query by sub-query and the results concatenated
    /// without deduplication. An empty query returns a copy of the whole collection.
    async fn fetch(&self, query: Query, collection: Option<&str>) -> DataServiceResult<Vec<Record>>;

    /// Returns the first record matching `query`, or `None` when nothing matches.
    async fn fetch_one(
        &self,
        query: Query,
        collection: Option<&str>,
    ) -> DataServiceResult<Option<Record>> {
        Ok(self
            .fetch(query, collection)
            .await?
            .into_iter()
            .next())
    }

    /// Creates or updates a record.
    ///
    /// A record without a primary identifier is created and given one. A record with a
    /// primary identifier replaces the stored record carrying that identifier.
    async fn save(&self, record: Record, collection: Option<&str>) -> DataServiceResult<Saved>;

    /// Saves each record independently.
    ///
    /// The returned futures may be awaited concurrently. There is no atomicity across the
    /// batch: some saves may succeed while others fail.
    fn save_many<'a>(
        &'a self,
        records: Vec<Record>,
        collection: Option<&'a str>,
    ) -> Vec<BoxFuture<'a, DataServiceResult<Saved>>> {
        records
            .into_iter()
            .map(|record| self.save(record, collection))
            .collect()
    }

    /// Removes every record matching `query` and returns the query.
    async fn remove(&self, query: Query, collection: Option<&str>) -> DataServiceResult<Query>;

    /// Builds the query used to look records up by identifier.
    fn create_id_query(&self, id: Query) -> Query;

    /// Generates a new identifier.
    fn generate_id(&self) -> String;
}

/// Factory trait for constructing data services.
#[async_trait]
pub trait DataServiceBuilder {
    type Service: DataService;

    async fn build(self) -> DataServiceResult<Self::Service>;
}
