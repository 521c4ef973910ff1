//! MongoDB storage backend.

use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, ReturnDocument},
};
use tracing::{debug, info};

use crudlayer_core::{
    backend::{ModifyOptions, StoreBackend, StoreBackendBuilder, UpdateSpec},
    error::{CrudError, CrudResult},
    query::{Query, SortDirection},
    record::{ID_FIELD, Record},
};

use crate::query::MongoQueryTranslator;

const DUPLICATE_KEY: i32 = 11000;

fn backend_error(err: MongoError) -> CrudError {
    CrudError::Backend(err.to_string())
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}


/// Storage backend over a MongoDB database.
///
/// Collections are addressed by name within one database. Dot-path update keys
/// are passed to the server unchanged, so `$set` patches nested fields natively.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self { client, database: database.into() }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// Returns the underlying driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record> {
        let record = match record.get(ID_FIELD) {
            Some(_) => record,
            None => {
                let mut stored = doc! { ID_FIELD: ObjectId::new() };
                for (field, value) in record {
                    stored.insert(field, value);
                }
                stored
            }
        };

        self.get_collection(collection)
            .insert_one(&record)
            .await
            .map_err(|e| match is_duplicate_key(&e) {
                true => CrudError::DocumentAlreadyExists(
                    record.get(ID_FIELD).map(Bson::to_string).unwrap_or_default(),
                    collection.to_string(),
                ),
                false => backend_error(e),
            })?;

        Ok(record)
    }

    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;
        debug!(collection, %filter, "running find");

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        self.get_collection(collection)
            .find_one(doc! { ID_FIELD: key.clone() })
            .await
            .map_err(backend_error)
    }

    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>> {
        self.get_collection(collection)
            .find_one_and_update(doc! { ID_FIELD: key.clone() }, update.to_document())
            .return_document(match options.return_updated {
                true => ReturnDocument::After,
                false => ReturnDocument::Before,
            })
            .upsert(options.upsert)
            .await
            .map_err(backend_error)
    }

    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        self.get_collection(collection)
            .find_one_and_delete(doc! { ID_FIELD: key.clone() })
            .await
            .map_err(backend_error)
    }

    async fn shutdown(self) -> CrudResult<()> {
        self.client.shutdown().await;
        info!(database = %self.database, "mongodb client shut down");

        Ok(())
    }
}

/// Builder for [`MongoDbStore`]: parses the connection string and connects.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    /// Sets the application name reported to the server.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> CrudResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| CrudError::Initialization(e.to_string()))?;

        if let Some(app_name) = self.app_name {
            options.app_name = Some(app_name);
        }

        let client = Client::with_options(options)
            .map_err(|e| CrudError::Initialization(e.to_string()))?;
        info!(database = %self.database, "mongodb client ready");

        Ok(MongoDbStore::new(client, self.database))
    }
}
