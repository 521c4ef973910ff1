//! Storage backend abstraction.
//!
//! A [`StoreBackend`] is the storage collaborator a
//! [`CrudService`](crate::service::CrudService) delegates to. Each service
//! operation issues exactly one backend call:
//!
//! | Service operation | Backend call |
//! |---|---|
//! | `create` | [`StoreBackend::insert_one`] |
//! | `list` / `query` | [`StoreBackend::find`] |
//! | `show` | [`StoreBackend::find_one`] |
//! | `update` | [`StoreBackend::find_one_and_update`] |
//! | `remove` | [`StoreBackend::find_one_and_delete`] |
//!
//! Implementations must be thread-safe (`Send + Sync`). Concurrent calls are
//! exactly as safe as the implementation makes them; the service adds no locking.
//!
//! # Examples
//!
//! ```ignore
//! use crudlayer::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! let created = backend.insert_one(doc! { "name": "Alice" }, "users").await?;
//! let key = created.get("_id").cloned().unwrap();
//! let found = backend.find_one(&key, "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use std::{any::Any, fmt::Debug, sync::Arc};

use crate::{
    error::{CrudError, CrudResult},
    query::Query,
    record::{Record, RecordId},
};

/// A path-addressed partial update.
///
/// Every key of [`UpdateSpec::set`] is a dot-path; applying the update overwrites
/// only those paths and leaves every other field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec {
    /// Dot-path → new value.
    pub set: Document,
}

impl UpdateSpec {
    /// Creates an update that sets the given (already flattened) paths.
    pub fn set(paths: Document) -> Self {
        Self { set: paths }
    }

    /// Renders this update as a `$set` operator document.
    pub fn to_document(&self) -> Document {
        doc! { "$set": self.set.clone() }
    }
}

/// Options for [`StoreBackend::find_one_and_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyOptions {
    /// Return the record as it is after the update instead of before.
    pub return_updated: bool,
    /// Insert a new record when nothing matches the key.
    pub upsert: bool,
}

impl Default for ModifyOptions {
    fn default() -> Self {
        Self { return_updated: true, upsert: false }
    }
}

/// Parses a [`RecordId`] into an object id key.
///
/// Text must be a 24 character hex string. Native keys are passed through as-is.
pub fn parse_object_id(id: RecordId) -> CrudResult<Bson> {
    match id {
        RecordId::Text(text) => ObjectId::parse_str(&text)
            .map(Bson::ObjectId)
            .map_err(|e| CrudError::InvalidId(format!("{text}: {e}"))),
        RecordId::Native(key) => Ok(key),
    }
}

/// Abstract interface for document storage backends.
///
/// # Error Handling
///
/// Lookups that find nothing return `Ok(None)`; the service turns that into
/// [`CrudError::NotFound`](crate::error::CrudError::NotFound). Every other error
/// is propagated to the caller unchanged.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a new record, assigning an `_id` when the record has none.
    ///
    /// # Returns
    ///
    /// The record as stored, including its `_id`.
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record>;

    /// Returns every record matching the query. An empty result is not an error.
    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>>;

    /// Returns the record stored under `key`, if any.
    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>>;

    /// Applies a path-addressed update to the record stored under `key`.
    ///
    /// # Returns
    ///
    /// The record after the update when `options.return_updated` is set, the record
    /// before the update otherwise, or `None` when nothing matched (and no upsert
    /// happened).
    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>>;

    /// Deletes the record stored under `key` and returns it as it was.
    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>>;

    /// Turns an external identifier into this backend's key form.
    ///
    /// The default accepts object id hex strings and passes native keys through.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidId`] when the identifier is malformed.
    fn parse_id(&self, id: RecordId) -> CrudResult<Bson> {
        parse_object_id(id)
    }

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> CrudResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record> {
        B::insert_one(*self, record, collection).await
    }

    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>> {
        B::find(*self, query, collection).await
    }

    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        B::find_one(*self, key, collection).await
    }

    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>> {
        B::find_one_and_update(*self, key, update, options, collection).await
    }

    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        B::find_one_and_delete(*self, key, collection).await
    }

    fn parse_id(&self, id: RecordId) -> CrudResult<Bson> {
        B::parse_id(*self, id)
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record> {
        B::insert_one(self, record, collection).await
    }

    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>> {
        B::find(self, query, collection).await
    }

    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        B::find_one(self, key, collection).await
    }

    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>> {
        B::find_one_and_update(self, key, update, options, collection).await
    }

    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        B::find_one_and_delete(self, key, collection).await
    }

    fn parse_id(&self, id: RecordId) -> CrudResult<Bson> {
        B::parse_id(self, id)
    }
}

/// Object-safe counterpart of [`StoreBackend`] for runtime backend selection.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record>;
    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>>;
    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>>;
    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>>;
    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>>;
    fn parse_id(&self, id: RecordId) -> CrudResult<Bson>;
    async fn shutdown_boxed(self: Box<Self>) -> CrudResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record> {
        StoreBackend::insert_one(self, record, collection).await
    }

    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>> {
        StoreBackend::find(self, query, collection).await
    }

    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        StoreBackend::find_one(self, key, collection).await
    }

    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>> {
        StoreBackend::find_one_and_update(self, key, update, options, collection).await
    }

    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        StoreBackend::find_one_and_delete(self, key, collection).await
    }

    fn parse_id(&self, id: RecordId) -> CrudResult<Bson> {
        StoreBackend::parse_id(self, id)
    }

    async fn shutdown_boxed(self: Box<Self>) -> CrudResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record> {
        DynStoreBackend::insert_one(&**self, record, collection).await
    }

    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>> {
        DynStoreBackend::find(&**self, query, collection).await
    }

    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        DynStoreBackend::find_one(&**self, key, collection).await
    }

    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>> {
        DynStoreBackend::find_one_and_update(&**self, key, update, options, collection).await
    }

    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        DynStoreBackend::find_one_and_delete(&**self, key, collection).await
    }

    fn parse_id(&self, id: RecordId) -> CrudResult<Bson> {
        DynStoreBackend::parse_id(&**self, id)
    }

    async fn shutdown(self) -> CrudResult<()> {
        DynStoreBackend::shutdown_boxed(self).await
    }
}

/// Factory for backends that need async setup (connections, pools).
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> CrudResult<Self::Backend>;
}
