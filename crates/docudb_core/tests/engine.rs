//! End-to-end engine scenarios against a real file system.

use docudb_core::error::{DbError, IndexError, SchemaError};
use docudb_core::schema::{Constraints, FieldDefinition, FieldType, Schema};
use docudb_core::{CollectionOptions, Database, DatabaseConfig, IndexOptions};
use regex::Regex;
use serde_json::{json, Value};
use tempfile::tempdir;

fn open_db(temp: &tempfile::TempDir) -> Database {
    open_db_with(temp, DatabaseConfig::default())
}

fn open_db_with(temp: &tempfile::TempDir, config: DatabaseConfig) -> Database {
    let db = Database::new(config.data_dir(temp.path())).unwrap();
    db.initialize().unwrap();
    db
}

fn id_of(doc: &docudb_core::Document) -> String {
    doc.get("_id").and_then(Value::as_str).unwrap().to_string()
}

#[test]
fn insert_and_query_with_operator() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let products = db.collection("products").unwrap();

    products
        .insert_many(vec![
            json!({"name": "Laptop", "price": 1000, "stock": 5}),
            json!({"name": "Mouse", "price": 20, "stock": 10}),
            json!({"name": "Keyboard", "price": 50, "stock": 8}),
        ])
        .unwrap();

    let expensive = products.find(&json!({"price": {"$gt": 50}})).unwrap();
    assert_eq!(expensive.len(), 1);
    assert_eq!(expensive[0].get("name"), Some(&json!("Laptop")));
}

#[test]
fn unique_index_enforcement() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let products = db.collection("products").unwrap();

    products
        .create_index(&["codigo"], IndexOptions::new().unique())
        .unwrap();
    products
        .insert_one(json!({"name": "P1", "codigo": "ABC123"}))
        .unwrap();

    let err = products
        .insert_one(json!({"name": "P2", "codigo": "ABC123"}))
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Index(IndexError::UniqueViolation { .. })
    ));
    assert_eq!(products.count(None).unwrap(), 1);
}

#[test]
fn schema_pattern_validation() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);

    let schema = Schema::builder()
        .field(
            "email",
            FieldDefinition::new(FieldType::String).required().validate(
                Constraints::new()
                    .pattern(Regex::new(r"^[\w\-\.]+@([\w\-]+\.)+[\w\-]{2,4}$").unwrap())
                    .message("Invalid email format"),
            ),
        )
        .build();
    let users = db
        .collection_with_options("users", CollectionOptions::new().schema(schema))
        .unwrap();

    let err = users.insert_one(json!({"email": "not-an-email"})).unwrap_err();
    match err {
        DbError::Schema(SchemaError::InvalidRegex { message, .. }) => {
            assert!(message.contains("Invalid email format"));
        }
        other => panic!("expected InvalidRegex, got {other:?}"),
    }

    users
        .insert_one(json!({"email": "ana@example.com"}))
        .unwrap();
    assert_eq!(users.count(None).unwrap(), 1);
}

#[test]
fn compound_unique_index() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let products = db.collection("products").unwrap();

    products
        .create_index(&["categoria", "name"], IndexOptions::new().unique())
        .unwrap();
    products
        .insert_one(json!({"name": "Laptop", "categoria": "Electronics", "codigo": "LAP001"}))
        .unwrap();

    let err = products
        .insert_one(json!({"name": "Laptop", "categoria": "Electronics", "codigo": "LAP002"}))
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Index(IndexError::UniqueViolation { .. })
    ));

    products
        .insert_one(json!({"name": "Laptop Pro", "categoria": "Electronics", "codigo": "LAP003"}))
        .unwrap();
    assert_eq!(products.count(None).unwrap(), 2);
}

#[test]
fn update_with_set_and_inc() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let products = db.collection("products").unwrap();

    let doc = products.insert_one(json!({"price": 100, "stock": 5})).unwrap();
    let id = id_of(&doc);
    let before = products.metadata().updated;

    let updated = products
        .update_by_id(&id, json!({"$set": {"price": 180}, "$inc": {"stock": -2}}))
        .unwrap()
        .unwrap();

    assert_eq!(updated.get("price"), Some(&json!(180)));
    assert_eq!(updated.get("stock"), Some(&json!(3)));
    assert_eq!(id_of(&updated), id);
    assert!(products.metadata().updated > before);
}

#[test]
fn persistence_across_reopen() {
    let temp = tempdir().unwrap();
    let mut ids = Vec::new();

    // First session: documents plus a unique index.
    {
        let db = open_db(&temp);
        let products = db.collection("products").unwrap();
        products
            .create_index(&["codigo"], IndexOptions::new().unique())
            .unwrap();
        for i in 0..3 {
            let doc = products
                .insert_one(json!({"name": format!("P{i}"), "codigo": format!("C{i}")}))
                .unwrap();
            ids.push(id_of(&doc));
        }
    }

    // Second session: same data, same ids, index still enforced.
    {
        let db = open_db(&temp);
        let products = db.collection("products").unwrap();

        let all = products.find(&json!({})).unwrap();
        assert_eq!(all.len(), 3);
        let reopened: Vec<String> = all.iter().map(id_of).collect();
        assert_eq!(reopened, ids);
        assert_eq!(all[0].get("name"), Some(&json!("P0")));

        let err = products
            .insert_one(json!({"name": "copy", "codigo": "C1"}))
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Index(IndexError::UniqueViolation { .. })
        ));
    }
}

#[test]
fn large_document_chunking() {
    let temp = tempdir().unwrap();
    let db = open_db_with(
        &temp,
        DatabaseConfig::default().chunk_size(512).compression(true),
    );
    let blobs = db.collection("blobs").unwrap();

    let description = "a".repeat(10_000);
    let mut details = serde_json::Map::new();
    for i in 0..100 {
        details.insert(format!("key_{i}"), json!(i));
    }

    let doc = blobs
        .insert_one(json!({"description": description, "details": details}))
        .unwrap();
    let id = id_of(&doc);

    // The document directory holds several compressed chunks.
    let doc_dir = temp
        .path()
        .join("docudb")
        .join("blobs")
        .join(&id);
    let chunk_files: Vec<_> = std::fs::read_dir(&doc_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.starts_with("chunk_") && name.ends_with(".gz"))
        .collect();
    assert!(chunk_files.len() > 1, "expected multiple chunks, got {chunk_files:?}");

    let loaded = blobs.find_by_id(&id).unwrap().unwrap();
    assert_eq!(
        loaded.get("description").and_then(Value::as_str).unwrap().len(),
        10_000
    );
    assert_eq!(
        loaded.get("details").and_then(Value::as_object).unwrap().len(),
        100
    );
}

#[test]
fn position_apis_reorder_enumeration() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let items = db.collection("items").unwrap();

    let ids: Vec<String> = (0..5)
        .map(|i| id_of(&items.insert_one(json!({"n": i})).unwrap()))
        .collect();

    items.update_position(&ids[0], 1).unwrap();
    let order: Vec<String> = items.find(&json!({})).unwrap().iter().map(id_of).collect();
    assert_eq!(
        order,
        vec![
            ids[1].clone(),
            ids[0].clone(),
            ids[2].clone(),
            ids[3].clone(),
            ids[4].clone()
        ]
    );
    assert_eq!(items.position_of(&ids[0]).unwrap(), Some(1));

    // Past-the-end clamps to the last position.
    items.update_position(&ids[1], 100).unwrap();
    assert_eq!(items.position_of(&ids[1]).unwrap(), Some(4));
}

#[test]
fn delete_then_reinsert_leaves_no_files() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let items = db.collection("items").unwrap();

    let first = id_of(&items.insert_one(json!({"name": "x"})).unwrap());
    assert!(items.delete_by_id(&first).unwrap());

    let second = id_of(&items.insert_one(json!({"name": "y"})).unwrap());
    assert!(items.delete_by_id(&second).unwrap());

    for id in [&first, &second] {
        let dir = temp.path().join("docudb").join("items").join(id);
        assert!(!dir.exists(), "leftover directory for {id}");
    }
    assert_eq!(items.count(None).unwrap(), 0);
    assert!(items.metadata().document_order.is_empty());
}

#[test]
fn count_matches_order_and_directories() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let items = db.collection("items").unwrap();

    for i in 0..4 {
        items.insert_one(json!({"n": i})).unwrap();
    }

    let meta = items.metadata();
    assert_eq!(meta.count, 4);
    assert_eq!(meta.document_order.len(), 4);

    let dirs = std::fs::read_dir(temp.path().join("docudb").join("items"))
        .unwrap()
        .filter(|e| {
            let entry = e.as_ref().unwrap();
            entry.path().is_dir()
                && !entry.file_name().to_string_lossy().starts_with('_')
        })
        .count();
    assert_eq!(dirs, 4);
}

#[test]
fn schema_timestamps_survive_updates() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);

    let schema = Schema::builder()
        .field("name", FieldDefinition::new(FieldType::String).required())
        .timestamps(true)
        .build();
    let notes = db
        .collection_with_options("notes", CollectionOptions::new().schema(schema))
        .unwrap();

    let doc = notes.insert_one(json!({"name": "first"})).unwrap();
    let id = id_of(&doc);
    let created = doc.get("_createdAt").cloned().unwrap();

    let updated = notes
        .update_by_id(&id, json!({"$set": {"name": "second"}}))
        .unwrap()
        .unwrap();
    assert_eq!(updated.get("_createdAt"), Some(&created));
    assert_eq!(id_of(&updated), id);
}

#[test]
fn strict_schema_rejects_unknown_keys() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);

    let schema = Schema::builder()
        .field("name", FieldDefinition::new(FieldType::String))
        .build();
    let items = db
        .collection_with_options("items", CollectionOptions::new().schema(schema))
        .unwrap();

    let err = items
        .insert_one(json!({"name": "x", "surprise": 1}))
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Schema(SchemaError::InvalidField { .. })
    ));
}

#[test]
fn dates_round_trip_through_storage() {
    let temp = tempdir().unwrap();

    let make_schema = || {
        Schema::builder()
            .field("title", FieldDefinition::new(FieldType::String))
            .field("due", FieldDefinition::new(FieldType::Date))
            .build()
    };

    let id = {
        let db = open_db(&temp);
        let tasks = db
            .collection_with_options("tasks", CollectionOptions::new().schema(make_schema()))
            .unwrap();
        let doc = tasks
            .insert_one(json!({"title": "ship", "due": "2024-06-01T09:30:00+02:00"}))
            .unwrap();
        // Validation canonicalized the offset away.
        assert_eq!(doc.get("due"), Some(&json!("2024-06-01T07:30:00.000Z")));
        id_of(&doc)
    };

    let db = open_db(&temp);
    let tasks = db
        .collection_with_options("tasks", CollectionOptions::new().schema(make_schema()))
        .unwrap();
    let loaded = tasks.find_by_id(&id).unwrap().unwrap();
    assert_eq!(loaded.get("due"), Some(&json!("2024-06-01T07:30:00.000Z")));

    // Date criteria match by instant, not by text.
    let hits = tasks
        .find(&json!({"due": "2024-06-01T09:30:00+02:00"}))
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn index_assisted_find_agrees_with_full_scan() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let products = db.collection("products").unwrap();

    for i in 0..10 {
        products
            .insert_one(json!({"sku": format!("S{i}"), "bucket": i % 2}))
            .unwrap();
    }

    let scanned = products.find(&json!({"sku": "S3"})).unwrap();
    products.create_index(&["sku"], IndexOptions::new()).unwrap();
    let indexed = products.find(&json!({"sku": "S3"})).unwrap();
    assert_eq!(scanned, indexed);

    // Operator criteria skip the index path but still answer correctly.
    let odd = products.find(&json!({"bucket": {"$gte": 1}})).unwrap();
    assert_eq!(odd.len(), 5);
}

#[test]
fn uuid_collections_generate_uuid_ids() {
    let temp = tempdir().unwrap();
    let db = open_db_with(
        &temp,
        DatabaseConfig::default().id_type(docudb_core::IdType::Uuid),
    );
    let items = db.collection("items").unwrap();

    let doc = items.insert_one(json!({"n": 1})).unwrap();
    let id = id_of(&doc);
    assert!(docudb_core::id::is_valid_uuid(&id));

    // Position APIs accept the same id format as everything else.
    assert_eq!(items.position_of(&id).unwrap(), Some(0));
}

#[test]
fn schema_owned_id_validation() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);

    let schema = Schema::builder()
        .field(
            "_id",
            FieldDefinition::new(FieldType::String)
                .validate(Constraints::new().pattern(Regex::new(r"^sku-\d{4}$").unwrap())),
        )
        .field("name", FieldDefinition::new(FieldType::String))
        .build();
    let items = db
        .collection_with_options("items", CollectionOptions::new().schema(schema))
        .unwrap();

    // The built-in 24-hex/UUID rule is replaced by the schema pattern.
    let doc = items
        .insert_one(json!({"_id": "sku-0001", "name": "x"}))
        .unwrap();
    assert_eq!(id_of(&doc), "sku-0001");
    assert!(items.find_by_id("sku-0001").unwrap().is_some());

    let err = items
        .insert_one(json!({"_id": "plainly-wrong", "name": "y"}))
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Schema(SchemaError::InvalidRegex { .. })
    ));
}

#[test]
fn delete_many_and_update_many() {
    let temp = tempdir().unwrap();
    let db = open_db(&temp);
    let products = db.collection("products").unwrap();

    products
        .insert_many(vec![
            json!({"name": "A", "price": 10}),
            json!({"name": "B", "price": 20}),
            json!({"name": "C", "price": 30}),
        ])
        .unwrap();

    let updated = products
        .update_many(&json!({"price": {"$gte": 20}}), &json!({"$inc": {"price": 5}}))
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(
        products.find_one(&json!({"name": "C"})).unwrap().unwrap().get("price"),
        Some(&json!(35))
    );

    let deleted = products.delete_many(&json!({"price": {"$gt": 20}})).unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(products.count(None).unwrap(), 1);
}
