//! MongoDB backend implementation for crudlayer.
//!
//! This crate provides a MongoDB implementation of the `StoreBackend` trait.
//! Every CRUD service operation maps onto one driver call, and path-addressed
//! updates are sent as a native `$set`.
//!
//! To use this backend, enable the `mongodb` feature of the facade crate:
//!
//! ```toml
//! [dependencies]
//! crudlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{backend::StoreBackendBuilder, mongodb::MongoDbStore, store::DocumentStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .app_name("people-api")
//!         .build()
//!         .await?;
//!     let store = DocumentStore::new(backend);
//!     let people = store.service("people")?;
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudlayer_mongodb;

mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
