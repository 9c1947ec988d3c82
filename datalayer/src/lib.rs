//! Main datalayer crate providing a uniform, collection-based record service.
//!
//! This crate is the primary entry point for users of datalayer. It re-exports the core
//! types from the sub-crates and provides access to the in-memory service.
//!
//! # Features
//!
//! - **Open-ended records** - Store any BSON document, identified by `_id` and optionally `id`
//! - **Asynchronous operations** - Fetch, save and remove behind one `DataService` trait
//! - **Pluggable matching** - Swap the filter generator to change what a query means
//! - **Change notification** - Subscribe to create, update and delete events
//!
//! # Quick Start
//!
//! ```ignore
//! use datalayer::{prelude::*, memory::InMemoryDataService};
//! use datalayer::bson::doc;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Note {
//!     pub msg: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = InMemoryDataService::builder().build().await?;
//!
//!     let saved = service
//!         .save(Record::from_value(&Note { msg: "hello".into() })?, None)
//!         .await?;
//!     let id = saved.record.primary_id().unwrap();
//!
//!     let note: Note = service
//!         .fetch_one(id.into(), None)
//!         .await?
//!         .unwrap()
//!         .to_value()?;
//!     assert_eq!(note.msg, "hello");
//!
//!     service.remove(Query::All, None).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Structured Queries
//!
//! ```ignore
//! let service = InMemoryDataService::builder()
//!     .structured_queries()
//!     .build()
//!     .await?;
//!
//! let adults = service
//!     .fetch(doc! { "age": { "$gte": 18 }, "name": { "$regex": "^A" } }.into(), None)
//!     .await?;
//! ```
//!
//! # Change Notification
//!
//! ```ignore
//! let notifier = Arc::new(ChangeNotifier::new());
//! let changes = notifier.subscribe(DEFAULT_EVENT_NAME);
//!
//! let service = InMemoryDataService::builder()
//!     .notification(notifier)
//!     .build()
//!     .await?;
//!
//! service.save(doc! { "msg": "hello" }.into(), None).await?;
//! assert_eq!(changes.try_recv()?.kind, ChangeKind::Create);
//! ```

pub mod prelude;

pub use datalayer_core::{error, event, filter, id, query, record, service};

// Re-export BSON types for convenience
pub use bson;

/// In-memory record service implementations.
pub mod memory {
    pub use datalayer_memory::{
        CollectionRegistry, InMemoryDataService, InMemoryDataServiceBuilder,
        StructuredFilterGenerator,
        predicate::{Expr, FieldOp, QueryVisitor},
    };
}
