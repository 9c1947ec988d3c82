//! In-memory record service for datalayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `DataService` trait.
//! Records live in named, ordered collections, each guarded by its own async-aware
//! read-write lock. It suits development, tests and small deployments.
//!
//! # Features
//!
//! - **Named collections** - A default collection plus any number created at runtime
//! - **Pluggable matching** - Identifier matching by default, structured predicates on request
//! - **Change notification** - Create, update and delete events published synchronously
//!
//! # Quick Start
//!
//! ```ignore
//! use datalayer_memory::InMemoryDataService;
//! use datalayer_core::service::{DataService, DataServiceBuilder};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = InMemoryDataService::builder().build().await?;
//!
//!     let saved = service.save(doc! { "msg": "hello" }.into(), None).await?;
//!     let id = saved.record.secondary_id().unwrap();
//!
//!     assert!(service.fetch_one(id.into(), None).await?.is_some());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as datalayer_memory;

pub mod evaluator;
pub mod predicate;
pub mod registry;
pub mod store;

pub use evaluator::StructuredFilterGenerator;
pub use registry::CollectionRegistry;
pub use store::{InMemoryDataService, InMemoryDataServiceBuilder};
