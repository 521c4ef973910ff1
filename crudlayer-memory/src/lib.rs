//! In-memory storage backend for crudlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait. It is meant for development, tests and small
//! deployments, and mirrors how a document database treats the operations a
//! CRUD service issues:
//!
//! - **Path-addressed updates** - `$set` paths patch nested leaves, creating
//!   intermediate documents as needed
//! - **Filtering** - dot-path equality, with array element matching
//! - **Sorting and paging** - by any dot-path
//! - **Upserts** - on request, a missed update inserts a new record
//!
//! # Quick Start
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend);
//!     let users = store.service("users")?;
//!
//!     let alice = users.create(doc! { "name": "Alice" }).await?;
//!     users.update(alice.get_object_id("_id")?, doc! { "age": 30 }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_memory;

mod evaluator;
mod update;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
