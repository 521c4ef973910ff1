//! Document store: owns a backend and hands out CRUD services.
//!
//! A [`DocumentStore`] is the "database handle" of this crate. Services created
//! from it borrow its backend, so any number of collections can be served from
//! one connection.
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{store::DocumentStore, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let users = store.service("users")?;
//! let posts = store.builder("posts").timestamps().build()?;
//! ```

use std::any::Any;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    error::CrudResult,
    service::{CrudService, CrudServiceBuilder},
};

/// A document store bound to a backend.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type. Use [`DocumentStore::into_dyn`] to
///   erase it.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates a CRUD service for the named collection with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Validation`](crate::error::CrudError::Validation) if the
    /// name is blank.
    pub fn service<'a>(&'a self, collection: &str) -> CrudResult<CrudService<&'a B>> {
        CrudService::new(&self.backend, collection)
    }

    /// Creates a service builder for the named collection, preset with this store's backend.
    pub fn builder<'a>(&'a self, collection: &str) -> CrudServiceBuilder<&'a B> {
        CrudServiceBuilder::new()
            .backend(&self.backend)
            .collection(collection)
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> CrudResult<()> {
        self.backend.shutdown().await
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type.
    pub fn into_dyn(self) -> DocumentStore<Box<dyn DynStoreBackend>> {
        DocumentStore::new(Box::new(self.backend))
    }
}

impl DocumentStore<Box<dyn DynStoreBackend>> {
    /// Returns the backend as `T` if that is its concrete type.
    pub fn backend_as<T: StoreBackend + 'static>(&self) -> Option<&T> {
        DynStoreBackend::as_any(&*self.backend).downcast_ref::<T>()
    }

    /// Recovers a statically typed store if the backend is a `T`.
    pub fn into_static<T: StoreBackend + 'static>(self) -> Option<DocumentStore<T>> {
        let any: Box<dyn Any> = DynStoreBackend::into_any(self.backend);

        any.downcast::<T>()
            .ok()
            .map(|backend| DocumentStore::new(*backend))
    }
}
