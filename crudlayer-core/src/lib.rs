//! A thin CRUD layer over document database collections.
//!
//! This crate is the core of the crudlayer project and provides:
//!
//! - **Records** ([`record`]) - The record type, identifiers and format conversions
//! - **Flattening** ([`flatten`]) - Nested documents to dot-path documents for partial updates
//! - **Queries** ([`query`]) - Filter expressions, sorting and paging
//! - **Storage backend abstraction** ([`backend`]) - The storage collaborator trait
//! - **CRUD services** ([`service`]) - create / list / show / update / remove over one collection
//! - **Document store** ([`store`]) - Owns a backend and hands out services
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let people = store
//!     .builder("people")
//!     .marshaller(id_marshaller)
//!     .timestamps()
//!     .build()?;
//!
//! let brian = people.create(doc! { "name": "brian", "books": { "x": [1, 2], "y": "v" } }).await?;
//! let id = brian.get_object_id("id")?;
//!
//! // Only `books.x` changes; `books.y` and `name` are preserved.
//! people.update(id, doc! { "books": { "x": [3, 4] } }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_core;

pub mod backend;
pub mod error;
pub mod flatten;
pub mod query;
pub mod record;
pub mod service;
pub mod store;
