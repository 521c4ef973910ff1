//! Convenient re-exports of commonly used types from crudlayer.
//!
//! ```ignore
//! use crudlayer::prelude::*;
//! ```

pub use crudlayer_core::{
    backend::{DynStoreBackend, ModifyOptions, StoreBackend, StoreBackendBuilder, UpdateSpec},
    error::{CrudError, CrudResult},
    flatten::{flatten, flatten_filter},
    query::{Expr, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    record::{ID_FIELD, Record, RecordExt, RecordId},
    service::{CrudService, CrudServiceBuilder, PUBLIC_ID_FIELD, Timestamps, id_marshaller},
    store::DocumentStore,
};
