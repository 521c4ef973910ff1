//! Error types and result types for CRUD service operations.
//!
//! The service layer itself raises only two kinds of error: [`CrudError::Validation`]
//! when a service is constructed without a backend or collection name, and
//! [`CrudError::NotFound`] when an identifier does not resolve to a record.
//! Everything else is produced by a storage backend and propagated unchanged.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with a CRUD service.
#[derive(Error, Debug)]
pub enum CrudError {
    /// The service was configured incorrectly (missing backend, empty collection name).
    #[error("Validation error: {0}")]
    Validation(String),
    /// No record with the requested identifier exists in the collection.
    #[error("No such record found with ID: {id} in collection {collection}")]
    NotFound {
        /// The identifier as supplied by the caller.
        id: String,
        /// The collection that was searched.
        collection: String,
    },
    /// The identifier could not be parsed into the backend's key form.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    /// A record with the same identifier already exists.
    /// The first argument is the record ID, the second is the collection name.
    #[error("Record {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The record or update violates the backend's structural rules.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON, typed).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl CrudError {
    /// Creates a [`CrudError::NotFound`] for the given identifier and collection.
    pub fn not_found(id: impl ToString, collection: impl Into<String>) -> Self {
        CrudError::NotFound {
            id: id.to_string(),
            collection: collection.into(),
        }
    }

    /// Returns `true` if this is a [`CrudError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, CrudError::NotFound { .. })
    }
}

/// A specialized `Result` type for CRUD operations.
pub type CrudResult<T> = Result<T, CrudError>;

impl From<BsonError> for CrudError {
    fn from(err: BsonError) -> Self {
        CrudError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for CrudError {
    fn from(err: SerdeJsonError) -> Self {
        CrudError::Serialization(err.to_string())
    }
}
