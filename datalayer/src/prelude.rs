//! Convenient re-exports of commonly used types from datalayer.
//!
//! ```ignore
//! use datalayer::prelude::*;
//! ```

pub use datalayer_core::{
    error::{DataServiceError, DataServiceResult},
    event::{ChangeEvent, ChangeKind, ChangeListener, ChangeNotifier, DEFAULT_EVENT_NAME},
    filter::{CustomFilterGenerator, FilterGenerator, IdFilterGenerator, RecordFilter},
    id::{IdGenerator, UuidIdGenerator},
    query::{DisjunctiveIdQueryBuilder, IdQueryBuilder, PassthroughIdQueryBuilder, Query},
    record::Record,
    service::{DEFAULT_COLLECTION, DataService, DataServiceBuilder, Saved},
};
