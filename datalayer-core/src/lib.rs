//! Core types for an in-memory, collection-based record service.
//!
//! This crate is the core of the datalayer project and provides:
//!
//! - **Records** ([`record`]) - Open-ended BSON records and their identity fields
//! - **Queries** ([`query`]) - The query shapes every operation accepts and identifier query builders
//! - **Filter generators** ([`filter`]) - Pluggable strategies compiling queries into record predicates
//! - **Change notification** ([`event`]) - Change events and the notifier they are published to
//! - **Identifier generation** ([`id`]) - Collision-resistant identifiers
//! - **Data service** ([`service`]) - The asynchronous create/read/update/delete interface
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use datalayer::query::Query;
//! use bson::doc;
//!
//! let records = service.fetch(Query::ids(["a", "b"]), None).await?;
//! let hello = service.fetch_one(doc! { "msg": "hello" }.into(), None).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as datalayer_core;

pub mod error;
pub mod event;
pub mod filter;
pub mod id;
pub mod query;
pub mod record;
pub mod service;
