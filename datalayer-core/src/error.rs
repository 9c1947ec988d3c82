//! Error types and result types for data service operations.
//!
//! Every fallible operation in this crate returns [`DataServiceResult<T>`]. Failures are
//! never retried internally; the caller decides what to do with a rejected operation.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a data service.
#[derive(Error, Debug)]
pub enum DataServiceError {
    /// No filter generator is able to interpret the query.
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),
    /// The query is structurally invalid (malformed operator, bad pattern, ...).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The requested collection is not registered with the service.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    /// A collection with the given name is already registered.
    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),
    /// A sub-query of a list query failed; the remaining sub-queries were not run.
    #[error("Subquery {index} failed: {source}")]
    Subquery {
        /// Position of the failing sub-query within the list.
        index: usize,
        /// The error raised by the sub-query.
        #[source]
        source: Box<DataServiceError>,
    },
    /// Serialization/deserialization error when converting between record formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The value cannot be represented as a record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    /// Error during service construction.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl DataServiceError {
    /// Wraps an error raised by the sub-query at `index` of a list query.
    pub fn subquery(index: usize, source: DataServiceError) -> Self {
        DataServiceError::Subquery {
            index,
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through nested sub-query failures.
    pub fn root_cause(&self) -> &DataServiceError {
        match self {
            DataServiceError::Subquery { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A specialized `Result` type for data service operations.
pub type DataServiceResult<T> = Result<T, DataServiceError>;

impl From<BsonError> for DataServiceError {
    fn from(err: BsonError) -> Self {
        DataServiceError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DataServiceError {
    fn from(err: SerdeJsonError) -> Self {
        DataServiceError::Serialization(err.to_string())
    }
}
