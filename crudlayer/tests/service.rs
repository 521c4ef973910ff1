use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use bson::{Bson, DateTime, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crudlayer::{memory::InMemoryStore, prelude::*};

type People<'a> = CrudService<&'a InMemoryStore>;

fn people(backend: &InMemoryStore) -> People<'_> {
    CrudService::new(backend, "people")
        .unwrap()
        .with_marshaller(id_marshaller)
}

/// Clock that advances one second per reading.
fn ticking_clock() -> Timestamps {
    let ticks = Arc::new(AtomicI64::new(0));
    Timestamps::new().with_clock(move || {
        DateTime::from_millis(1_000 * ticks.fetch_add(1, Ordering::SeqCst))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    name: String,
    surname: Option<String>,
}

#[tokio::test]
async fn create_assigns_id_and_marshals() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "name": "x" }).await.unwrap();

    assert_eq!(created.get_str("name").unwrap(), "x");
    let oid = created.get_object_id("_id").unwrap();
    assert_eq!(created.get_object_id("id").unwrap(), oid);
}

#[tokio::test]
async fn create_without_marshaller_returns_stored_record() {
    let backend = InMemoryStore::new();
    let service = CrudService::new(&backend, "people").unwrap();

    let created = service.create(doc! { "name": "x" }).await.unwrap();
    assert!(created.get("id").is_none());
    assert!(created.get_object_id("_id").is_ok());
}

#[tokio::test]
async fn list_returns_every_record() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    assert!(people.list(None).await.unwrap().is_empty());

    people.create(doc! { "name": "brian" }).await.unwrap();
    people.create(doc! { "name": "ned" }).await.unwrap();

    let all = people.list(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|record| record.contains_key("id")));
}

#[tokio::test]
async fn list_filters_by_value() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    people.create(doc! { "name": "brian", "surname": "miranda" }).await.unwrap();
    people.create(doc! { "name": "brian", "surname": "eno" }).await.unwrap();
    people.create(doc! { "name": "ned" }).await.unwrap();

    let brians = people.list(Some(doc! { "name": "brian" })).await.unwrap();
    assert_eq!(brians.len(), 2);

    let none = people.list(Some(doc! { "name": "arya" })).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn list_filters_by_nested_path() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    people.create(doc! { "a": "ned", "b": { "c": "stark", "d": 1 } }).await.unwrap();
    people.create(doc! { "a": "ned", "b": { "c": "snow" } }).await.unwrap();

    // Only the named leaf constrains; `b.d` is not required to be absent.
    let starks = people
        .list(Some(doc! { "b": { "c": "stark" } }))
        .await
        .unwrap();
    assert_eq!(starks.len(), 1);
    assert_eq!(starks[0].get_document("b").unwrap().get_i32("d").unwrap(), 1);
}

#[tokio::test]
async fn show_returns_marshalled_record() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let shown = people.show(oid).await.unwrap();
    assert_eq!(shown, created);

    let by_text = people.show(oid.to_hex()).await.unwrap();
    assert_eq!(by_text, created);
}

#[tokio::test]
async fn update_keeps_sibling_fields() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let updated = people
        .update(oid, doc! { "surname": "miranda" })
        .await
        .unwrap();

    assert_eq!(updated.get_str("name").unwrap(), "brian");
    assert_eq!(updated.get_str("surname").unwrap(), "miranda");
    assert_eq!(updated.get_object_id("id").unwrap(), oid);
    assert_eq!(people.show(oid).await.unwrap(), updated);
}

#[tokio::test]
async fn update_patches_nested_leaves_only() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people
        .create(doc! { "name": "brian", "books": { "x": [1, 2], "y": "v" } })
        .await
        .unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let updated = people
        .update(oid, doc! { "books": { "x": [3, 4] } })
        .await
        .unwrap();

    assert_eq!(updated.get_document("books").unwrap(), &doc! { "x": [3, 4], "y": "v" });
    assert_eq!(updated.get_str("name").unwrap(), "brian");
}

#[tokio::test]
async fn update_replaces_arrays_wholesale() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "tags": ["a", "b", "c"] }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let updated = people.update(oid, doc! { "tags": ["z"] }).await.unwrap();
    assert_eq!(updated.get_array("tags").unwrap(), &vec![Bson::from("z")]);
}

#[tokio::test]
async fn update_with_nothing_to_set_returns_current_record() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let unchanged = people.update(oid, doc! { "books": {} }).await.unwrap();
    assert_eq!(unchanged, created);
}

#[tokio::test]
async fn update_through_scalar_is_rejected() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let err = people
        .update(oid, doc! { "name": { "first": "b" } })
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::InvalidDocument(_)));
    assert_eq!(people.show(oid).await.unwrap(), created);
}

#[tokio::test]
async fn update_with_huge_array_index_is_rejected() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "list": [1, 2] }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let err = people
        .update(oid, doc! { "list": { "18446744073709551615": 1 } })
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::InvalidDocument(_)));
    assert_eq!(people.show(oid).await.unwrap(), created);
}

#[tokio::test]
async fn remove_returns_deleted_record() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();

    let removed = people.remove(oid).await.unwrap();
    assert_eq!(removed, created);
    assert!(people.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let backend = InMemoryStore::new();
    let people = people(&backend);
    people.create(doc! { "name": "brian" }).await.unwrap();

    let missing = ObjectId::new();

    let err = people.show(missing).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains(&missing.to_hex()));

    let err = people.update(missing, doc! { "name": "ned" }).await.unwrap_err();
    assert!(err.is_not_found());

    let err = people.remove(missing).await.unwrap_err();
    assert!(matches!(
        err,
        CrudError::NotFound { ref id, ref collection } if *id == missing.to_hex() && collection == "people"
    ));

    // A missed update must not insert anything.
    assert_eq!(people.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn removed_record_is_not_found_afterwards() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    let oid = created.get_object_id("_id").unwrap();
    people.remove(oid).await.unwrap();

    assert!(people.show(oid).await.unwrap_err().is_not_found());
    assert!(people.remove(oid).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let err = people.show("nonexistent-id").await.unwrap_err();
    assert!(matches!(err, CrudError::InvalidId(_)));
}

#[tokio::test]
async fn timestamps_track_creation_and_update() {
    let backend = InMemoryStore::new();
    let people = CrudService::new(&backend, "people")
        .unwrap()
        .with_timestamp_config(ticking_clock());

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    let created_at = *created.get_datetime("createdAt").unwrap();
    assert_eq!(created.get_datetime("updatedAt").unwrap(), &created_at);

    let oid = created.get_object_id("_id").unwrap();
    let updated = people.update(oid, doc! { "surname": "miranda" }).await.unwrap();

    assert_eq!(updated.get_datetime("createdAt").unwrap(), &created_at);
    assert!(*updated.get_datetime("updatedAt").unwrap() > created_at);
}

#[tokio::test]
async fn timestamp_fields_are_configurable() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::new(backend);
    let people = store
        .builder("people")
        .timestamps_with(Timestamps::new().with_fields("created", "modified"))
        .build()
        .unwrap();

    let created = people.create(doc! { "name": "brian" }).await.unwrap();
    assert!(created.get_datetime("created").is_ok());
    assert!(created.get_datetime("modified").is_ok());
    assert!(created.get("createdAt").is_none());
}

#[tokio::test]
async fn services_share_a_backend() {
    let backend = Arc::new(InMemoryStore::new());
    let people = CrudService::new(backend.clone(), "people").unwrap();
    let books = CrudService::new(backend.clone(), "books").unwrap();

    people.create(doc! { "name": "brian" }).await.unwrap();
    books.create(doc! { "title": "dune" }).await.unwrap();

    assert_eq!(backend.count("people").await, 1);
    assert_eq!(backend.count("books").await, 1);
    assert_eq!(people.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn typed_records_round_trip_through_service() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let created = people
        .create_from(&Person { name: "brian".into(), surname: None })
        .await
        .unwrap();
    let oid = created.get_object_id("_id").unwrap();
    people.update(oid, doc! { "surname": "miranda" }).await.unwrap();

    let person: Person = people.show_as(oid).await.unwrap();
    assert_eq!(person, Person { name: "brian".into(), surname: Some("miranda".into()) });
}

#[tokio::test]
async fn json_input_is_accepted() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    let record = Record::from_json(json!({ "name": "brian", "books": { "y": "v" } })).unwrap();
    let created = people.create(record).await.unwrap();

    let found = people.list(Some(doc! { "books": { "y": "v" } })).await.unwrap();
    assert_eq!(found, vec![created]);
}

#[tokio::test]
async fn query_sorts_and_pages() {
    let backend = InMemoryStore::new();
    let people = people(&backend);

    for (name, age) in [("a", 30), ("b", 10), ("c", 20)] {
        people.create(doc! { "name": name, "age": age }).await.unwrap();
    }

    let page = people
        .query(
            Query::builder()
                .sort("age", SortDirection::Asc)
                .limit(2)
                .build(),
        )
        .await
        .unwrap();

    let names = page
        .iter()
        .map(|record| record.get_str("name").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["b", "c"]);
    assert!(page.iter().all(|record| record.contains_key("id")));
}

#[tokio::test]
async fn store_hands_out_services() {
    let store = DocumentStore::new(InMemoryStore::new());

    {
        let people = store.service("people").unwrap();
        assert_eq!(people.name(), "people");
        assert!(matches!(store.service(""), Err(CrudError::Validation(_))));

        people.create(doc! { "name": "brian" }).await.unwrap();
    }
    assert_eq!(store.backend().count("people").await, 1);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn dynamic_store_recovers_backend() {
    let store = DocumentStore::new(InMemoryStore::new()).into_dyn();

    {
        let people = store.service("people").unwrap();
        people.create(doc! { "name": "brian" }).await.unwrap();
        assert_eq!(people.list(None).await.unwrap().len(), 1);
    }

    let backend = store.backend_as::<InMemoryStore>().unwrap();
    assert_eq!(backend.count("people").await, 1);

    let store = store.into_static::<InMemoryStore>().unwrap();
    assert_eq!(store.backend().count("people").await, 1);
    store.shutdown().await.unwrap();
}
