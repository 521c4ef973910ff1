//! In-memory storage implementation for CRUD services.
//!
//! Records are kept per collection in ordered maps behind an async-aware
//! read-write lock. Updates are applied to a copy of the stored record and only
//! committed once every path has been applied.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::{debug, trace};

use crudlayer_core::{
    backend::{ModifyOptions, StoreBackend, StoreBackendBuilder, UpdateSpec},
    error::{CrudError, CrudResult},
    query::{Query, SortDirection},
    record::{ID_FIELD, Record},
};

use crate::{
    evaluator::{RecordEvaluator, sort_key},
    update::apply_update,
};

type CollectionMap = BTreeMap<String, Record>;
type StoreMap = HashMap<String, CollectionMap>;

fn storage_key(key: &Bson) -> String {
    key.to_string()
}


/// Thread-safe in-memory storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same underlying data and can be handed to several services
/// or tasks.
///
/// Queries scan every record of a collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use crudlayer_memory::InMemoryStore;
/// use crudlayer_core::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let created = store.insert_one(doc! { "name": "Alice" }, "users").await?;
/// let key = created.get("_id").cloned().unwrap();
/// assert!(store.find_one(&key, "users").await?.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (storage key -> record)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of records held in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_one(&self, record: Record, collection: &str) -> CrudResult<Record> {
        let record = match record.get(ID_FIELD) {
            Some(_) => record,
            None => {
                let mut stored = Document::new();
                stored.insert(ID_FIELD, ObjectId::new());
                for (field, value) in record {
                    stored.insert(field, value);
                }
                stored
            }
        };
        let key = record
            .get(ID_FIELD)
            .map(storage_key)
            .ok_or_else(|| CrudError::InvalidDocument(format!("record has no '{ID_FIELD}'")))?;

        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if collection_map.contains_key(&key) {
            return Err(CrudError::DocumentAlreadyExists(key, collection.to_string()));
        }

        trace!(%key, collection, "inserting record");
        collection_map.insert(key, record.clone());

        Ok(record)
    }

    async fn find(&self, query: Query, collection: &str) -> CrudResult<Vec<Record>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut records = match &query.filter {
            Some(filter) => RecordEvaluator::filter_records(
                collection_map.values(),
                filter,
            )?,
            None => collection_map
                .values()
                .cloned()
                .collect::<Vec<_>>(),
        };

        if let Some(sort) = &query.sort {
            records.sort_by(|a, b| {
                let left = sort_key(a, &sort.field);
                let right = sort_key(b, &sort.field);

                match sort.direction {
                    SortDirection::Asc => left.cmp(&right),
                    SortDirection::Desc => right.cmp(&left),
                }
            });
        }

        debug!(collection, matched = records.len(), "query evaluated");

        Ok(
            records
                .into_iter()
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .collect()
        )
    }

    async fn find_one(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .and_then(|col| col.get(&storage_key(key)))
                .cloned()
        )
    }

    async fn find_one_and_update(
        &self,
        key: &Bson,
        update: UpdateSpec,
        options: ModifyOptions,
        collection: &str,
    ) -> CrudResult<Option<Record>> {
        let slot = storage_key(key);
        let mut store = self.store.write().await;

        let existing = store
            .get(collection)
            .and_then(|col| col.get(&slot))
            .cloned();

        let (before, after) = match existing {
            Some(before) => {
                let after = apply_update(&before, &update)?;
                (Some(before), after)
            }
            None if options.upsert => {
                let mut seed = Document::new();
                seed.insert(ID_FIELD, key.clone());
                (None, apply_update(&seed, &update)?)
            }
            None => return Ok(None),
        };

        trace!(key = %slot, collection, upserted = before.is_none(), "committing update");
        store
            .entry(collection.to_string())
            .or_default()
            .insert(slot, after.clone());

        Ok(match options.return_updated {
            true => Some(after),
            false => before,
        })
    }

    async fn find_one_and_delete(&self, key: &Bson, collection: &str) -> CrudResult<Option<Record>> {
        let mut store = self.store.write().await;

        Ok(
            store
                .get_mut(collection)
                .and_then(|col| col.remove(&storage_key(key)))
        )
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use crudlayer_memory::InMemoryStore;
/// use crudlayer_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> CrudResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use crudlayer_core::query::Filter;

    #[tokio::test]
    async fn insert_assigns_leading_object_id() {
        let store = InMemoryStore::new();
        let created = store.insert_one(doc! { "name": "brian" }, "people").await.unwrap();

        assert_eq!(created.keys().next().map(String::as_str), Some("_id"));
        assert!(created.get_object_id("_id").is_ok());
        assert_eq!(store.count("people").await, 1);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = InMemoryStore::new();
        store.insert_one(doc! { "_id": 1 }, "people").await.unwrap();

        let err = store.insert_one(doc! { "_id": 1 }, "people").await.unwrap_err();
        assert!(matches!(err, CrudError::DocumentAlreadyExists(_, _)));
    }

    #[tokio::test]
    async fn missing_collection_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.find(Query::new(), "nothing").await.unwrap().is_empty());
        assert!(store.find_one(&Bson::Int32(1), "nothing").await.unwrap().is_none());
        assert!(store.find_one_and_delete(&Bson::Int32(1), "nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_sorts_then_pages() {
        let store = InMemoryStore::new();
        for (id, age) in [(1, 30), (2, 10), (3, 20), (4, 40)] {
            store.insert_one(doc! { "_id": id, "age": age }, "people").await.unwrap();
        }

        let query = Query::builder()
            .sort("age", SortDirection::Desc)
            .offset(1)
            .limit(2)
            .build();
        let ages = store
            .find(query, "people")
            .await
            .unwrap()
            .iter()
            .map(|r| r.get_i32("age").unwrap())
            .collect::<Vec<_>>();

        assert_eq!(ages, vec![30, 20]);
    }

    #[tokio::test]
    async fn sorting_mixed_types_is_total() {
        let store = InMemoryStore::new();
        for i in 0..60_i32 {
            let value = match i % 3 {
                0 => Bson::Int32(60 - i),
                1 => Bson::String(format!("s{:02}", 60 - i)),
                _ => Bson::Double(f64::NAN),
            };
            store.insert_one(doc! { "_id": i, "v": value }, "mixed").await.unwrap();
        }
        store.insert_one(doc! { "_id": 100 }, "mixed").await.unwrap();

        let query = Query::builder().sort("v", SortDirection::Asc).build();
        let sorted = store.find(query, "mixed").await.unwrap();
        let values = sorted.iter().map(|r| r.get("v")).collect::<Vec<_>>();

        // Missing first, then NaN, then numbers ascending, then strings ascending.
        assert_eq!(values[0], None);
        assert!(values[1..21].iter().all(|v| matches!(v, Some(Bson::Double(d)) if d.is_nan())));

        let ints = values[21..41]
            .iter()
            .map(|v| match v {
                Some(Bson::Int32(n)) => *n,
                other => panic!("expected an integer, got {other:?}"),
            })
            .collect::<Vec<_>>();
        assert!(ints.windows(2).all(|pair| pair[0] < pair[1]));

        let strings = values[41..]
            .iter()
            .map(|v| match v {
                Some(Bson::String(s)) => s.as_str(),
                other => panic!("expected a string, got {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(strings.len(), 20);
        assert!(strings.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn find_applies_filter() {
        let store = InMemoryStore::new();
        store.insert_one(doc! { "b": { "c": "emre" } }, "people").await.unwrap();
        store.insert_one(doc! { "b": { "c": "stark" } }, "people").await.unwrap();

        let query = Query::builder().filter(Filter::eq("b.c", "emre")).build();
        let found = store.find(query, "people").await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_document("b").unwrap(), &doc! { "c": "emre" });
    }

    #[tokio::test]
    async fn update_returns_before_or_after() {
        let store = InMemoryStore::new();
        store.insert_one(doc! { "_id": 1, "n": 1 }, "counters").await.unwrap();
        let key = Bson::Int32(1);

        let before = store
            .find_one_and_update(
                &key,
                UpdateSpec::set(doc! { "n": 2 }),
                ModifyOptions { return_updated: false, upsert: false },
                "counters",
            )
            .await
            .unwrap();
        assert_eq!(before, Some(doc! { "_id": 1, "n": 1 }));

        let after = store
            .find_one_and_update(&key, UpdateSpec::set(doc! { "n": 3 }), ModifyOptions::default(), "counters")
            .await
            .unwrap();
        assert_eq!(after, Some(doc! { "_id": 1, "n": 3 }));
    }

    #[tokio::test]
    async fn update_misses_without_upsert() {
        let store = InMemoryStore::new();
        let updated = store
            .find_one_and_update(&Bson::Int32(9), UpdateSpec::set(doc! { "n": 1 }), ModifyOptions::default(), "counters")
            .await
            .unwrap();

        assert!(updated.is_none());
        assert_eq!(store.count("counters").await, 0);
    }

    #[tokio::test]
    async fn upsert_creates_record_under_key() {
        let store = InMemoryStore::new();
        let upserted = store
            .find_one_and_update(
                &Bson::Int32(9),
                UpdateSpec::set(doc! { "a.b": 1 }),
                ModifyOptions { return_updated: true, upsert: true },
                "counters",
            )
            .await
            .unwrap();

        assert_eq!(upserted, Some(doc! { "_id": 9, "a": { "b": 1 } }));
        assert_eq!(store.count("counters").await, 1);
    }

    #[tokio::test]
    async fn failed_update_is_not_committed() {
        let store = InMemoryStore::new();
        store.insert_one(doc! { "_id": 1, "a": 1 }, "things").await.unwrap();

        let result = store
            .find_one_and_update(
                &Bson::Int32(1),
                UpdateSpec::set(doc! { "z": 1, "a.b": 2 }),
                ModifyOptions::default(),
                "things",
            )
            .await;

        assert!(result.is_err());
        let stored = store.find_one(&Bson::Int32(1), "things").await.unwrap();
        assert_eq!(stored, Some(doc! { "_id": 1, "a": 1 }));
    }

    #[tokio::test]
    async fn delete_returns_removed_record() {
        let store = InMemoryStore::new();
        store.insert_one(doc! { "_id": 1 }, "things").await.unwrap();

        let removed = store.find_one_and_delete(&Bson::Int32(1), "things").await.unwrap();
        assert_eq!(removed, Some(doc! { "_id": 1 }));
        assert!(store.find_one_and_delete(&Bson::Int32(1), "things").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::builder().build().await.unwrap();
        let other = store.clone();
        store.insert_one(doc! { "_id": 1 }, "things").await.unwrap();

        assert_eq!(other.count("things").await, 1);
    }
}
