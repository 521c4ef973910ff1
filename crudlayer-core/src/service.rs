//! The CRUD service: create, list, show, update and remove over one collection.
//!
//! A [`CrudService`] binds a collection name to a [`StoreBackend`] and wraps each
//! backend call with the boilerplate application code would otherwise repeat:
//!
//! - external identifiers are parsed into the backend's key form,
//! - modification sets are flattened so updates patch leaves instead of replacing fields,
//! - a missing record becomes [`CrudError::NotFound`],
//! - every returned record passes through the configured marshaller.
//!
//! Configuration (marshaller, creation hook, timestamps) is fixed once the service
//! is built; the `with_*` methods consume and return the service so they can be
//! chained right after construction.
//!
//! # Example
//!
//! ```ignore
//! use crudlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let users = CrudService::new(InMemoryStore::new(), "users")?
//!     .with_marshaller(id_marshaller)
//!     .with_timestamps();
//!
//! let created = users.create(doc! { "name": "brian" }).await?;
//! let id = created.get_object_id("id")?;
//! let patched = users.update(id, doc! { "surname": "miranda" }).await?;
//! ```

use bson::{DateTime, Document};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, sync::Arc};
use tracing::{Span, debug, field, instrument, warn};

use crate::{
    backend::{ModifyOptions, StoreBackend, UpdateSpec},
    error::{CrudError, CrudResult},
    flatten::{flatten, merge_auto_fields},
    query::Query,
    record::{ID_FIELD, Record, RecordExt, RecordId},
};

/// Output transform applied to every record returned to a caller.
pub type Marshaller = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// Transform applied to a caller's input before it is inserted.
pub type CreateHook = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// Source of the current time for timestamp fields.
pub type Clock = Arc<dyn Fn() -> DateTime + Send + Sync>;

/// Field [`id_marshaller`] copies the storage identifier into.
pub const PUBLIC_ID_FIELD: &str = "id";

/// Marshaller that copies the storage identifier (`_id`) into a public `id` field.
///
/// ```
/// use bson::{doc, oid::ObjectId};
/// use crudlayer_core::service::id_marshaller;
///
/// let oid = ObjectId::new();
/// let record = id_marshaller(doc! { "_id": oid });
/// assert_eq!(record.get_object_id("id").unwrap(), oid);
/// ```
pub fn id_marshaller(mut record: Record) -> Record {
    if let Some(id) = record.get(ID_FIELD).cloned() {
        record.insert(PUBLIC_ID_FIELD, id);
    }
    record
}

/// Timestamp settings for a service.
///
/// Creating a record sets both fields to the same instant. Updating a record
/// only sets [`Timestamps::updated_field`].
#[derive(Clone)]
pub struct Timestamps {
    /// Field holding the creation time. Defaults to `createdAt`.
    pub created_field: String,
    /// Field holding the last update time. Defaults to `updatedAt`.
    pub updated_field: String,
    clock: Clock,
}

impl Timestamps {
    /// Creates timestamp settings with the default field names and wall-clock time.
    pub fn new() -> Self {
        Self {
            created_field: "createdAt".to_string(),
            updated_field: "updatedAt".to_string(),
            clock: Arc::new(|| DateTime::from_chrono(chrono::Utc::now())),
        }
    }

    /// Overrides the field names.
    pub fn with_fields(mut self, created: impl Into<String>, updated: impl Into<String>) -> Self {
        self.created_field = created.into();
        self.updated_field = updated.into();
        self
    }

    /// Overrides the clock.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Returns the current time according to the configured clock.
    pub fn now(&self) -> DateTime {
        (self.clock)()
    }

    fn create_fields(&self) -> Document {
        let now = self.now();
        let mut fields = Document::new();
        fields.insert(self.created_field.clone(), now);
        fields.insert(self.updated_field.clone(), now);
        fields
    }

    fn update_fields(&self) -> Document {
        let mut fields = Document::new();
        fields.insert(self.updated_field.clone(), self.now());
        fields
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timestamps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timestamps")
            .field("created_field", &self.created_field)
            .field("updated_field", &self.updated_field)
            .finish_non_exhaustive()
    }
}

/// CRUD operations over a single collection.
///
/// # Type Parameters
///
/// * `B` - The storage backend. References, `Arc`s and boxed dynamic backends all
///   implement [`StoreBackend`], so several services can share one backend.
pub struct CrudService<B: StoreBackend> {
    name: String,
    backend: B,
    marshaller: Option<Marshaller>,
    on_create: Option<CreateHook>,
    timestamps: Option<Timestamps>,
}

impl<B: StoreBackend> CrudService<B> {
    /// Creates a service for `collection` on `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Validation`] if the collection name is empty.
    pub fn new(backend: B, collection: impl Into<String>) -> CrudResult<Self> {
        Self::builder()
            .backend(backend)
            .collection(collection)
            .build()
    }

    /// Creates a builder for a service.
    pub fn builder() -> CrudServiceBuilder<B> {
        CrudServiceBuilder::new()
    }

    /// Replaces the marshaller applied to every returned record.
    pub fn with_marshaller(mut self, marshaller: impl Fn(Record) -> Record + Send + Sync + 'static) -> Self {
        self.marshaller = Some(Arc::new(marshaller));
        self
    }

    /// Sets a hook that transforms the input of [`CrudService::create`] before insertion.
    pub fn with_create_hook(mut self, hook: impl Fn(Record) -> Record + Send + Sync + 'static) -> Self {
        self.on_create = Some(Arc::new(hook));
        self
    }

    /// Enables `createdAt` / `updatedAt` timestamps with wall-clock time.
    pub fn with_timestamps(self) -> Self {
        self.with_timestamp_config(Timestamps::new())
    }

    /// Enables timestamps with custom field names or clock.
    pub fn with_timestamp_config(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the timestamp settings, if timestamps are enabled.
    pub fn timestamps(&self) -> Option<&Timestamps> {
        self.timestamps.as_ref()
    }

    /// Applies the configured marshaller to a record.
    pub fn marshal(&self, record: Record) -> Record {
        match &self.marshaller {
            Some(marshal) => marshal(record),
            None => record,
        }
    }

    /// Inserts a new record and returns it as stored, marshalled.
    ///
    /// The creation hook runs first; timestamp fields are then merged underneath the
    /// input, so values supplied by the caller win.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn create(&self, record: Record) -> CrudResult<Record> {
        let record = match &self.on_create {
            Some(hook) => hook(record),
            None => record,
        };
        let auto = self
            .timestamps
            .as_ref()
            .map(Timestamps::create_fields)
            .unwrap_or_default();

        let created = self
            .backend
            .insert_one(merge_auto_fields(auto, record), &self.name)
            .await?;
        debug!(id = ?created.get(ID_FIELD), "record created");

        Ok(self.marshal(created))
    }

    /// Serializes `value` and creates it as a record.
    pub async fn create_from<T: Serialize>(&self, value: &T) -> CrudResult<Record> {
        self.create(Record::from_typed(value)?).await
    }

    /// Lists records matching `filter`.
    ///
    /// The filter is flattened, so nested documents constrain individual paths.
    /// `None` lists every record. An empty result is not an error.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn list(&self, filter: Option<Document>) -> CrudResult<Vec<Record>> {
        self.query(Query::from_filter(filter.as_ref())).await
    }

    /// Runs a structured query (filter, sort, paging) and marshals the results.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn query(&self, query: Query) -> CrudResult<Vec<Record>> {
        let records = self.backend.find(query, &self.name).await?;
        debug!(count = records.len(), "records found");

        Ok(records
            .into_iter()
            .map(|record| self.marshal(record))
            .collect())
    }

    /// Fetches exactly one record.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::NotFound`] when no record has this identifier.
    #[instrument(skip_all, fields(collection = %self.name, id = field::Empty))]
    pub async fn show(&self, id: impl Into<RecordId>) -> CrudResult<Record> {
        let id = id.into();
        Span::current().record("id", field::display(&id));

        let key = self.backend.parse_id(id.clone())?;

        match self.backend.find_one(&key, &self.name).await? {
            Some(record) => Ok(self.marshal(record)),
            None => Err(self.not_found(&id)),
        }
    }

    /// Fetches one record and deserializes it into `T`.
    ///
    /// The marshaller runs before deserialization.
    pub async fn show_as<T: DeserializeOwned>(&self, id: impl Into<RecordId>) -> CrudResult<T> {
        self.show(id).await?.into_typed()
    }

    /// Patches a record and returns it as it is after the update, marshalled.
    ///
    /// `modifications` is flattened into dot-paths: only the leaves it names are
    /// overwritten and every other field is preserved. Arrays are replaced
    /// wholesale. An empty nested document sets nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::NotFound`] when no record has this identifier.
    #[instrument(skip_all, fields(collection = %self.name, id = field::Empty))]
    pub async fn update(&self, id: impl Into<RecordId>, modifications: Document) -> CrudResult<Record> {
        let id = id.into();
        Span::current().record("id", field::display(&id));

        let key = self.backend.parse_id(id.clone())?;
        let auto = self
            .timestamps
            .as_ref()
            .map(Timestamps::update_fields)
            .unwrap_or_default();
        let paths = flatten(&merge_auto_fields(auto, modifications));

        // Nothing to set; report the record as it stands.
        if paths.is_empty() {
            return match self.backend.find_one(&key, &self.name).await? {
                Some(record) => Ok(self.marshal(record)),
                None => Err(self.not_found(&id)),
            };
        }

        debug!(paths = paths.len(), "applying update");
        let updated = self
            .backend
            .find_one_and_update(
                &key,
                UpdateSpec::set(paths),
                ModifyOptions { return_updated: true, upsert: false },
                &self.name,
            )
            .await?;

        match updated {
            Some(record) => Ok(self.marshal(record)),
            None => Err(self.not_found(&id)),
        }
    }

    /// Deletes a record and returns it as it was before deletion, marshalled.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::NotFound`] when nothing was deleted.
    #[instrument(skip_all, fields(collection = %self.name, id = field::Empty))]
    pub async fn remove(&self, id: impl Into<RecordId>) -> CrudResult<Record> {
        let id = id.into();
        Span::current().record("id", field::display(&id));

        let key = self.backend.parse_id(id.clone())?;

        match self.backend.find_one_and_delete(&key, &self.name).await? {
            Some(record) => {
                debug!("record removed");
                Ok(self.marshal(record))
            }
            None => Err(self.not_found(&id)),
        }
    }

    fn not_found(&self, id: &RecordId) -> CrudError {
        warn!(%id, collection = %self.name, "no record with this id");
        CrudError::not_found(id, &self.name)
    }
}

impl<B: StoreBackend> fmt::Debug for CrudService<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrudService")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .field("marshaller", &self.marshaller.is_some())
            .field("on_create", &self.on_create.is_some())
            .field("timestamps", &self.timestamps)
            .finish()
    }
}

/// Builder for [`CrudService`].
///
/// Both the backend and a non-empty collection name are required;
/// [`CrudServiceBuilder::build`] fails with [`CrudError::Validation`] otherwise.
pub struct CrudServiceBuilder<B: StoreBackend> {
    backend: Option<B>,
    collection: Option<String>,
    marshaller: Option<Marshaller>,
    on_create: Option<CreateHook>,
    timestamps: Option<Timestamps>,
}

impl<B: StoreBackend> CrudServiceBuilder<B> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            backend: None,
            collection: None,
            marshaller: None,
            on_create: None,
            timestamps: None,
        }
    }

    /// Sets the storage backend.
    pub fn backend(mut self, backend: B) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Sets the marshaller applied to every returned record.
    pub fn marshaller(mut self, marshaller: impl Fn(Record) -> Record + Send + Sync + 'static) -> Self {
        self.marshaller = Some(Arc::new(marshaller));
        self
    }

    /// Sets the hook applied to the input of `create`.
    pub fn on_create(mut self, hook: impl Fn(Record) -> Record + Send + Sync + 'static) -> Self {
        self.on_create = Some(Arc::new(hook));
        self
    }

    /// Enables timestamps with default field names and wall-clock time.
    pub fn timestamps(mut self) -> Self {
        self.timestamps = Some(Timestamps::new());
        self
    }

    /// Enables timestamps with custom settings.
    pub fn timestamps_with(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Validation`] if the backend is missing or the collection
    /// name is missing or blank.
    pub fn build(self) -> CrudResult<CrudService<B>> {
        let backend = self
            .backend
            .ok_or_else(|| CrudError::Validation("a storage backend is required".to_string()))?;
        let name = match self.collection {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(CrudError::Validation("a collection name is required".to_string())),
        };

        Ok(CrudService {
            name,
            backend,
            marshaller: self.marshaller,
            on_create: self.on_create,
            timestamps: self.timestamps,
        })
    }
}

impl<B: StoreBackend> Default for CrudServiceBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}
