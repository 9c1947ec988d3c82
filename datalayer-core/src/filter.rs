//! Filter generators compile queries into record predicates.
//!
//! A [`FilterGenerator`] is the pluggable strategy a data service uses to turn a [`Query`]
//! into a [`RecordFilter`]. The service never inspects which implementation it holds.
//!
//! This crate provides:
//!
//! - [`IdFilterGenerator`] - the default, matching on the two identity fields
//! - [`CustomFilterGenerator`] - wraps a caller supplied closure
//!
//! Structured predicate matching lives with the in-memory backend.

use std::fmt;

use bson::Document;

use crate::{
    error::DataServiceResult,
    query::Query,
    record::{PRIMARY_ID_FIELD, Record, SECONDARY_ID_FIELD, id_string},
};

/// A compiled predicate over records.
pub type RecordFilter = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// Compiles a query into a predicate over records.
pub trait FilterGenerator: Send + Sync {
    /// Compiles `query` into a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be interpreted by this generator.
    fn compile(&self, query: &Query) -> DataServiceResult<RecordFilter>;
}

/// Returns a filter that accepts every record.
pub fn match_all() -> RecordFilter {
    Box::new(|_: &Record| true)
}

/// Returns a filter matching records whose primary or secondary identifier equals `id`.
pub fn match_id(id: impl Into<String>) -> RecordFilter {
    let id = id.into();
    Box::new(move |record: &Record| record.has_id(&id))
}

/// Combines filters with logical OR.
pub fn match_any(filters: Vec<RecordFilter>) -> RecordFilter {
    Box::new(move |record: &Record| filters.iter().any(|filter| filter(record)))
}

/// Default generator: equality on the primary or the secondary identifier.
///
/// - [`Query::All`] and empty predicates match everything.
/// - [`Query::Id`] matches when either identity field equals the identifier.
/// - [`Query::Predicate`] matches when the record's `_id` equals the predicate's `_id`, or
///   its `id` equals the predicate's `id`. Other predicate fields are ignored.
/// - [`Query::List`] matches the union of its sub-queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdFilterGenerator;

impl IdFilterGenerator {
    fn compile_predicate(predicate: &Document) -> RecordFilter {
        if predicate.is_empty() {
            return match_all();
        }

        let primary = predicate.get(PRIMARY_ID_FIELD).and_then(id_string);
        let secondary = predicate.get(SECONDARY_ID_FIELD).and_then(id_string);

        Box::new(move |record: &Record| {
            let primary_matches = primary
                .as_ref()
                .is_some_and(|id| record.primary_id().as_ref() == Some(id));
            let secondary_matches = secondary
                .as_ref()
                .is_some_and(|id| record.secondary_id().as_ref() == Some(id));

            primary_matches || secondary_matches
        })
    }
}

impl FilterGenerator for IdFilterGenerator {
    fn compile(&self, query: &Query) -> DataServiceResult<RecordFilter> {
        Ok(match query {
            Query::All => match_all(),
            Query::Id(id) => match_id(id.as_str()),
            Query::Predicate(predicate) => Self::compile_predicate(predicate),
            Query::List(queries) => match_any(
                queries
                    .iter()
                    .map(|query| self.compile(query))
                    .collect::<DataServiceResult<Vec<_>>>()?,
            ),
        })
    }
}

/// Adapts a closure into a [`FilterGenerator`].
///
/// # Example
///
/// ```ignore
/// use datalayer::filter::{CustomFilterGenerator, RecordFilter};
/// use datalayer::query::Query;
/// use datalayer::record::Record;
///
/// let contains = CustomFilterGenerator::new(|query: &Query| {
///     let needle = match query {
///         Query::Id(needle) => needle.clone(),
///         _ => String::new(),
///     };
///     Ok(Box::new(move |record: &Record| {
///         record.get_str("msg").is_some_and(|msg| msg.contains(&needle))
///     }) as RecordFilter)
/// });
/// ```
pub struct CustomFilterGenerator<F> {
    compile: F,
}

impl<F> CustomFilterGenerator<F>
where
    F: Fn(&Query) -> DataServiceResult<RecordFilter> + Send + Sync,
{
    pub fn new(compile: F) -> Self {
        Self { compile }
    }
}

impl<F> FilterGenerator for CustomFilterGenerator<F>
where
    F: Fn(&Query) -> DataServiceResult<RecordFilter> + Send + Sync,
{
    fn compile(&self, query: &Query) -> DataServiceResult<RecordFilter> {
        (self.compile)(query)
    }
}

impl<F> fmt::Debug for CustomFilterGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFilterGenerator").finish_non_exhaustive()
    }
}
