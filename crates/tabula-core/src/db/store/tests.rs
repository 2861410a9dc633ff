use crate::{
    db::store::{
        FileTextStore, FlatBackend, IndexedBackend, IndexedRegistry, MemoryTextStore,
        StorageBackend, TextStore, flat::Loaded, integral_id, next_numeric_id,
    },
    error::ErrorClass,
    obs::{EventMetrics, MetricsSink, NoopMetricsSink},
    record::Record,
    value::Value,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};

fn person(name: &str) -> Record {
    Record::new().with("name", name)
}

async fn indexed(registry: &Arc<IndexedRegistry>, version: u32) -> IndexedBackend {
    let backend = IndexedBackend::new(registry.clone(), "db", "people", "id", version);
    backend.init(None).await.expect("init should succeed");
    backend
}

fn flat(text: Arc<dyn TextStore>) -> FlatBackend {
    FlatBackend::new(text, Arc::new(NoopMetricsSink), "db:people", "id")
}

// ---- shared helpers ----

#[test]
fn next_numeric_id_is_one_past_max() {
    let ids = [Value::Int(3), Value::from("x"), Value::Float(7.5), Value::Null];
    assert_eq!(next_numeric_id(ids.iter()), Some(8));
    assert_eq!(next_numeric_id(std::iter::empty()), Some(1));
    assert_eq!(next_numeric_id([Value::Int(-4)].iter()), Some(1));
    assert_eq!(next_numeric_id([Value::from(" 41 ")].iter()), Some(42));
}

#[test]
fn next_numeric_id_is_exact_above_float_precision() {
    let ids = [Value::Int(9_007_199_254_740_993), Value::Float(1.0e300)];
    assert_eq!(next_numeric_id(ids.iter()), Some(9_007_199_254_740_994));
    assert_eq!(next_numeric_id([Value::Int(i64::MAX)].iter()), None);
}

#[test]
fn integral_id_views() {
    assert_eq!(integral_id(&Value::Int(-3)), Some(-3));
    assert_eq!(integral_id(&Value::Float(2.9)), Some(2));
    assert_eq!(integral_id(&Value::Float(f64::NAN)), None);
    assert_eq!(integral_id(&Value::from("12")), Some(12));
    assert_eq!(integral_id(&Value::from("1.5")), None);
    assert_eq!(integral_id(&Value::Bool(true)), None);
}

#[test]
fn loaded_decode_tags_corruption() {
    assert!(matches!(Loaded::decode(None), Loaded::Fresh(rows) if rows.is_empty()));
    assert!(matches!(Loaded::decode(Some("[{\"id\":1}]")), Loaded::Fresh(rows) if rows.len() == 1));
    assert!(matches!(Loaded::decode(Some("{not json")), Loaded::Recovered { .. }));
    assert!(matches!(Loaded::decode(Some("[1,2]")), Loaded::Recovered { .. }));
}

// ---- indexed ----

#[tokio::test]
async fn indexed_requires_init() {
    let registry = Arc::new(IndexedRegistry::new());
    let backend = IndexedBackend::new(registry, "db", "people", "id", 1);

    let err = backend.fetch_all().await.expect_err("fetch before init");
    assert!(err.is_not_open());
}

#[tokio::test]
async fn indexed_generates_sequential_keys() {
    let registry = Arc::new(IndexedRegistry::new());
    let backend = indexed(&registry, 1).await;

    assert_eq!(backend.insert(person("A")).await.unwrap(), Value::Int(1));
    assert_eq!(backend.insert(person("B")).await.unwrap(), Value::Int(2));
    assert_eq!(
        backend.insert(person("C").with("id", 10)).await.unwrap(),
        Value::Int(10)
    );
    assert_eq!(backend.insert(person("D")).await.unwrap(), Value::Int(11));

    let rows = backend.fetch_all().await.unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].field("name"), &Value::from("A"));
}

#[tokio::test]
async fn indexed_rejects_duplicate_and_invalid_keys() {
    let registry = Arc::new(IndexedRegistry::new());
    let backend = indexed(&registry, 1).await;
    backend.insert(person("A").with("id", 1)).await.unwrap();

    let dup = backend
        .insert(person("B").with("id", 1.0))
        .await
        .expect_err("duplicate key");
    assert_eq!(dup.class, ErrorClass::Conflict);

    let bad = backend
        .insert(person("C").with("id", true))
        .await
        .expect_err("bool key");
    assert_eq!(bad.class, ErrorClass::Unsupported);
}

#[tokio::test]
async fn indexed_update_replaces_and_ignores_missing() {
    let registry = Arc::new(IndexedRegistry::new());
    let backend = indexed(&registry, 1).await;
    let id = backend
        .insert(person("A").with("age", 30))
        .await
        .unwrap();

    assert!(backend.update(&id, person("Z")).await.unwrap());
    let rows = backend.fetch_all().await.unwrap();
    assert_eq!(rows[0], Record::new().with("id", 1).with("name", "Z"));

    assert!(!backend.update(&Value::Int(99), person("Q")).await.unwrap());
    assert_eq!(backend.fetch_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn indexed_delete_is_idempotent() {
    let registry = Arc::new(IndexedRegistry::new());
    let backend = indexed(&registry, 1).await;
    let id = backend.insert(person("A")).await.unwrap();

    assert!(backend.delete(&id).await.unwrap());
    assert!(backend.delete(&id).await.unwrap());
    assert!(backend.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn indexed_upgrade_hook_sees_versions() {
    let registry = Arc::new(IndexedRegistry::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    for version in [1, 1, 3] {
        let backend = IndexedBackend::new(registry.clone(), "db", "people", "id", version);
        let log = seen.clone();
        let hook = move |old: u32, new: u32| log.lock().expect("hook lock").push((old, new));
        backend.init(Some(&hook)).await.unwrap();
    }

    assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (1, 3)]);
    assert_eq!(registry.version("db").await, Some(3));
}

#[tokio::test]
async fn indexed_open_below_stored_version_fails() {
    let registry = Arc::new(IndexedRegistry::new());
    indexed(&registry, 2).await;

    let older = IndexedBackend::new(registry.clone(), "db", "people", "id", 1);
    assert!(older.init(None).await.is_err());
}

#[tokio::test]
async fn indexed_shares_data_across_handles() {
    let registry = Arc::new(IndexedRegistry::new());
    let first = indexed(&registry, 1).await;
    first.insert(person("A")).await.unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let hook = move |_: u32, _: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
    };
    let second = IndexedBackend::new(registry.clone(), "db", "people", "id", 1);
    second.init(Some(&hook)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.fetch_all().await.unwrap().len(), 1);
    assert_eq!(registry.store_names("db").await, vec!["people".to_string()]);
}

// ---- flat ----

#[tokio::test]
async fn flat_init_seeds_empty_array() {
    let text = Arc::new(MemoryTextStore::new());
    let backend = flat(text.clone());
    backend.init(None).await.unwrap();

    assert_eq!(
        text.get_item("db:people").await.unwrap().as_deref(),
        Some("[]")
    );
}

#[tokio::test]
async fn flat_assigns_max_plus_one() {
    let backend = flat(Arc::new(MemoryTextStore::new()));
    backend.init(None).await.unwrap();

    backend.insert(person("A").with("id", 5)).await.unwrap();
    let id = backend.insert(person("B")).await.unwrap();
    assert_eq!(id, Value::Int(6));

    let dup = backend.insert(person("C").with("id", 5)).await;
    assert_eq!(dup.expect_err("dup").class, ErrorClass::Conflict);
}

#[tokio::test]
async fn flat_update_merges_and_keeps_id() {
    let backend = flat(Arc::new(MemoryTextStore::new()));
    let id = backend
        .insert(person("A").with("age", 30))
        .await
        .unwrap();

    let patch = Record::new().with("age", 31).with("id", 77);
    assert!(backend.update(&id, patch).await.unwrap());
    assert!(!backend.update(&Value::Int(42), person("X")).await.unwrap());

    let rows = backend.fetch_all().await.unwrap();
    assert_eq!(
        rows,
        vec![Record::new().with("id", 1).with("name", "A").with("age", 31)]
    );
}

#[tokio::test]
async fn flat_corrupt_payload_reads_empty_and_counts() {
    let text = Arc::new(MemoryTextStore::new());
    text.set_item("db:people", "{{garbage").await.unwrap();

    let metrics = Arc::new(EventMetrics::new());
    let sink: Arc<dyn MetricsSink> = metrics.clone();
    let backend = FlatBackend::new(text.clone(), sink, "db:people", "id");

    assert!(backend.fetch_all().await.unwrap().is_empty());
    assert_eq!(metrics.snapshot().ops.corrupt_payloads, 1);

    // the next write replaces the corrupt payload
    backend.insert(person("A")).await.unwrap();
    assert_eq!(backend.fetch_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn flat_clear_and_delete() {
    let backend = flat(Arc::new(MemoryTextStore::new()));
    let a = backend.insert(person("A")).await.unwrap();
    backend.insert(person("B")).await.unwrap();

    assert!(backend.delete(&a).await.unwrap());
    assert!(backend.delete(&a).await.unwrap());
    assert_eq!(backend.fetch_all().await.unwrap().len(), 1);

    assert!(backend.clear().await.unwrap());
    assert!(backend.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let dir = tempfile::tempdir().expect("tempdir");

    let first = flat(Arc::new(FileTextStore::new(dir.path())));
    first.init(None).await.unwrap();
    first.insert(person("A")).await.unwrap();

    let second = flat(Arc::new(FileTextStore::new(dir.path())));
    let rows = second.fetch_all().await.unwrap();
    assert_eq!(rows, vec![Record::new().with("id", 1).with("name", "A")]);
    assert!(dir.path().join("db_people.json").exists());
}

#[tokio::test]
async fn file_store_missing_and_remove() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileTextStore::new(dir.path().join("nested"));

    assert_eq!(store.get_item("k").await.unwrap(), None);
    store.set_item("k", "v").await.unwrap();
    assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v"));

    store.remove_item("k").await.unwrap();
    store.remove_item("k").await.unwrap();
    assert_eq!(store.get_item("k").await.unwrap(), None);
}

// ---- id generation near the top of the range ----

#[tokio::test]
async fn generated_ids_stay_unique_above_float_precision() {
    let registry = Arc::new(IndexedRegistry::new());
    let backends: [Box<dyn StorageBackend>; 2] = [
        Box::new(indexed(&registry, 1).await),
        Box::new(flat(Arc::new(MemoryTextStore::new()))),
    ];

    for backend in backends {
        backend
            .insert(Record::new().with("id", 9_007_199_254_740_993_i64))
            .await
            .unwrap();
        let generated = backend.insert(Record::new().with("n", 1)).await.unwrap();

        assert_eq!(generated, Value::Int(9_007_199_254_740_994));
        assert_eq!(backend.fetch_all().await.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn exhausted_id_space_is_a_conflict() {
    let registry = Arc::new(IndexedRegistry::new());
    let backends: [Box<dyn StorageBackend>; 2] = [
        Box::new(indexed(&registry, 1).await),
        Box::new(flat(Arc::new(MemoryTextStore::new()))),
    ];

    for backend in backends {
        backend
            .insert(Record::new().with("id", i64::MAX))
            .await
            .unwrap();
        let err = backend
            .insert(Record::new().with("n", 1))
            .await
            .expect_err("no id left");

        assert_eq!(err.class, ErrorClass::Conflict);
        assert_eq!(backend.fetch_all().await.unwrap().len(), 1);
    }
}
