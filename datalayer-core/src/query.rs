//! Query values and identifier query builders.
//!
//! A [`Query`] is one of four shapes:
//!
//! - [`Query::All`] matches every record (the empty/absent query)
//! - [`Query::Id`] is a single raw identifier
//! - [`Query::List`] is an ordered sequence of sub-queries whose results are concatenated
//! - [`Query::Predicate`] is a structured predicate object interpreted by the active
//!   [`FilterGenerator`](crate::filter::FilterGenerator)
//!
//! # Example
//!
//! ```ignore
//! use datalayer::query::Query;
//! use bson::doc;
//!
//! let by_id = Query::from("5f1c...");
//! let by_ids = Query::ids(["a", "b"]);
//! let by_msg = Query::from(doc! { "msg": { "$regex": "^hel" } });
//! ```

use bson::{Bson, Document};

use crate::record::{PRIMARY_ID_FIELD, SECONDARY_ID_FIELD};

/// A query value accepted by every data service operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Query {
    /// Matches every record.
    #[default]
    All,
    /// A single raw identifier, matched against the identity fields.
    Id(String),
    /// The union of the results of each sub-query, in sub-query order.
    List(Vec<Query>),
    /// A structured predicate object.
    Predicate(Document),
}

impl Query {
    /// Creates a list query from a sequence of identifiers.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::List(ids.into_iter().map(|id| Query::Id(id.into())).collect())
    }

    /// Returns `true` for queries that match every record without compiling a filter.
    ///
    /// That is [`Query::All`] and a predicate with no fields. An empty list is not empty
    /// in this sense: it matches nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Query::All => true,
            Query::Predicate(predicate) => predicate.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Query {
    fn from(id: &str) -> Self {
        Query::Id(id.to_string())
    }
}

impl From<String> for Query {
    fn from(id: String) -> Self {
        Query::Id(id)
    }
}

impl From<&String> for Query {
    fn from(id: &String) -> Self {
        Query::Id(id.clone())
    }
}

impl From<Document> for Query {
    fn from(predicate: Document) -> Self {
        Query::Predicate(predicate)
    }
}

impl<Q: Into<Query>> From<Vec<Q>> for Query {
    fn from(queries: Vec<Q>) -> Self {
        Query::List(queries.into_iter().map(Into::into).collect())
    }
}

impl<Q: Into<Query>> From<Option<Q>> for Query {
    fn from(query: Option<Q>) -> Self {
        query.map(Into::into).unwrap_or_default()
    }
}

impl<Q: Into<Query>> FromIterator<Q> for Query {
    fn from_iter<I: IntoIterator<Item = Q>>(iter: I) -> Self {
        Query::List(iter.into_iter().map(Into::into).collect())
    }
}

/// Turns raw identifiers into queries a filter generator can interpret.
pub trait IdQueryBuilder: Send + Sync {
    /// Builds the query used to look records up by `id`.
    fn build_id_query(&self, id: Query) -> Query;
}

/// Returns identifiers unchanged.
///
/// A generic store has no guaranteed way to interpret a compound query, so this is the
/// default. Pair [`DisjunctiveIdQueryBuilder`] with a structured filter generator instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughIdQueryBuilder;

impl IdQueryBuilder for PassthroughIdQueryBuilder {
    fn build_id_query(&self, id: Query) -> Query {
        id
    }
}

/// Expands each raw identifier into `{ "$or": [{ "_id": id }, { "id": id }] }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisjunctiveIdQueryBuilder;

impl IdQueryBuilder for DisjunctiveIdQueryBuilder {
    fn build_id_query(&self, id: Query) -> Query {
        match id {
            Query::List(ids) => Query::List(
                ids.into_iter()
                    .map(|id| self.build_id_query(id))
                    .collect(),
            ),
            Query::Id(id) => {
                let mut primary = Document::new();
                primary.insert(PRIMARY_ID_FIELD, id.clone());
                let mut secondary = Document::new();
                secondary.insert(SECONDARY_ID_FIELD, id);

                let mut predicate = Document::new();
                predicate.insert(
                    "$or",
                    vec![Bson::Document(primary), Bson::Document(secondary)],
                );
                Query::Predicate(predicate)
            }
            other => other,
        }
    }
}
