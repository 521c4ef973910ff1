//! A thin CRUD layer over document database collections.
//!
//! This crate is the entry point of crudlayer. It re-exports the core types and
//! gives access to the storage backends.
//!
//! # Features
//!
//! - **Partial updates by path** - Nested modification sets are flattened into
//!   dot-paths, so an update patches leaves and preserves sibling fields
//! - **Uniform not-found handling** - Missing records become `CrudError::NotFound`
//! - **Output marshalling** - A per-service transform applied to every returned record
//! - **Timestamps** - Optional `createdAt` / `updatedAt` maintenance
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let people = store
//!         .builder("people")
//!         .marshaller(id_marshaller)
//!         .timestamps()
//!         .build()?;
//!
//!     let brian = people
//!         .create(doc! { "name": "brian", "books": { "x": [1, 2], "y": "v" } })
//!         .await?;
//!     let id = brian.get_object_id("id")?;
//!
//!     // Only `books.x` and `updatedAt` change.
//!     let brian = people.update(id, doc! { "books": { "x": [3, 4] } }).await?;
//!     assert_eq!(brian.get_document("books")?.get_str("y")?, "v");
//!
//!     // Nested filters constrain individual paths.
//!     let found = people.list(Some(doc! { "books": { "y": "v" } })).await?;
//!     assert_eq!(found.len(), 1);
//!
//!     people.remove(id).await?;
//!     assert!(people.show(id).await.unwrap_err().is_not_found());
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A store can erase its backend type with [`store::DocumentStore::into_dyn`]
//! when the backend is selected at runtime. The concrete backend can be
//! recovered with `backend_as` or `into_static`.
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new()).into_dyn();
//! let users = store.service("users")?;
//! assert!(store.backend_as::<InMemoryStore>().is_some());
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use crudlayer_core::{backend, error, flatten, query, record, service, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use crudlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use crudlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
