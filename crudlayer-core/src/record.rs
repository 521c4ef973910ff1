//! Records, identifiers and format conversions.
//!
//! A [`Record`] is an untyped BSON document. The storage layer assigns its `_id`
//! when it is created. Callers address records through a [`RecordId`], which the
//! backend turns into its own key form (see
//! [`StoreBackend::parse_id`](crate::backend::StoreBackend::parse_id)).

use bson::{Bson, Document, de::deserialize_from_bson, oid::ObjectId, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;

use crate::error::{CrudError, CrudResult};

/// A single stored document.
pub type Record = Document;

/// Name of the field the storage layer uses for a record's identity.
pub const ID_FIELD: &str = "_id";

/// An externally supplied record identifier.
///
/// Identifiers arrive either as text (for example from a URL path) or as a value
/// already in the storage key form. Backends decide how text is parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordId {
    /// A textual identifier that still needs to be parsed by the backend.
    Text(String),
    /// A value already in the backend's key form.
    Native(Bson),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Text(text) => f.write_str(text),
            RecordId::Native(Bson::ObjectId(oid)) => f.write_str(&oid.to_hex()),
            RecordId::Native(Bson::String(text)) => f.write_str(text),
            RecordId::Native(other) => write!(f, "{other}"),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

impl From<&String> for RecordId {
    fn from(value: &String) -> Self {
        RecordId::Text(value.clone())
    }
}

impl From<ObjectId> for RecordId {
    fn from(value: ObjectId) -> Self {
        RecordId::Native(Bson::ObjectId(value))
    }
}

impl From<Bson> for RecordId {
    fn from(value: Bson) -> Self {
        RecordId::Native(value)
    }
}

impl From<&Bson> for RecordId {
    fn from(value: &Bson) -> Self {
        RecordId::Native(value.clone())
    }
}

/// Conversion helpers for records.
pub trait RecordExt: Sized {
    /// Builds a record from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidDocument`] if the value is not an object.
    fn from_json(value: Value) -> CrudResult<Self>;

    /// Converts this record to JSON. BSON-specific values use extended JSON.
    fn to_json(&self) -> CrudResult<Value>;

    /// Builds a record from any serializable value that serializes to a map.
    fn from_typed<T: Serialize>(value: &T) -> CrudResult<Self>;

    /// Deserializes this record into a typed value.
    fn into_typed<T: DeserializeOwned>(self) -> CrudResult<T>;

    /// Returns the storage-assigned identifier, if present.
    fn record_id(&self) -> Option<&Bson>;
}

impl RecordExt for Record {
    fn from_json(value: Value) -> CrudResult<Self> {
        if !value.is_object() {
            return Err(CrudError::InvalidDocument(format!(
                "expected a JSON object, got {value}"
            )));
        }

        Self::from_typed(&value)
    }

    fn to_json(&self) -> CrudResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_typed<T: Serialize>(value: &T) -> CrudResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(CrudError::InvalidDocument(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    fn into_typed<T: DeserializeOwned>(self) -> CrudResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self))?)
    }

    fn record_id(&self) -> Option<&Bson> {
        self.get(ID_FIELD)
    }
}
