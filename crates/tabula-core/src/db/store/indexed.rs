use crate::{
    db::store::{StorageBackend, UpgradeHook, integral_id},
    error::InternalError,
    record::Record,
    value::{Value, ValueKey},
};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::RwLock;

///
/// IndexedRegistry
///
/// Versioned databases, each holding named object stores of records
/// ordered by key. Shared by every indexed backend of one environment.
///

#[derive(Debug, Default)]
pub struct IndexedRegistry {
    databases: RwLock<BTreeMap<String, IndexedDatabase>>,
}

impl IndexedRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored version of a database, if it has been opened.
    pub async fn version(&self, db_name: &str) -> Option<u32> {
        self.databases.read().await.get(db_name).map(|db| db.version)
    }

    /// Names of the object stores in a database.
    pub async fn store_names(&self, db_name: &str) -> Vec<String> {
        self.databases
            .read()
            .await
            .get(db_name)
            .map(|db| db.stores.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct IndexedDatabase {
    version: u32,
    stores: BTreeMap<String, ObjectStore>,
}

///
/// ObjectStore
///
/// `next_key` is the key generator: always one past the largest integral
/// key written so far, and `None` once `i64::MAX` has been written.
///

#[derive(Debug)]
struct ObjectStore {
    next_key: Option<i64>,
    rows: BTreeMap<ValueKey, Record>,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self {
            next_key: Some(1),
            rows: BTreeMap::new(),
        }
    }
}

impl ObjectStore {
    fn observe_key(&mut self, key: &Value) {
        if let Some(n) = integral_id(key)
            && let Some(next) = self.next_key
            && n >= next
        {
            self.next_key = n.checked_add(1);
        }
    }
}

///
/// IndexedBackend
///

pub struct IndexedBackend {
    registry: Arc<IndexedRegistry>,
    db_name: String,
    store_name: String,
    qualified: String,
    id_key: String,
    version: u32,
    opened: AtomicBool,
}

impl IndexedBackend {
    #[must_use]
    pub fn new(
        registry: Arc<IndexedRegistry>,
        db_name: impl Into<String>,
        store_name: impl Into<String>,
        id_key: impl Into<String>,
        version: u32,
    ) -> Self {
        let db_name = db_name.into();
        let store_name = store_name.into();

        Self {
            registry,
            qualified: format!("{db_name}:{store_name}"),
            db_name,
            store_name,
            id_key: id_key.into(),
            version,
            opened: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), InternalError> {
        if self.opened.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(InternalError::store_not_open(&self.qualified))
        }
    }

    // Keys follow the keyed-store rules: numbers, text and lists only.
    fn check_key(&self, key: &Value) -> Result<(), InternalError> {
        match key {
            Value::Int(_) | Value::Text(_) | Value::List(_) => Ok(()),
            Value::Float(f) if !f.is_nan() => Ok(()),
            other => Err(InternalError::store_unsupported(format!(
                "invalid key in store '{}': {} is not a valid key",
                self.qualified,
                other.kind_label()
            ))),
        }
    }

    async fn with_store<R>(
        &self,
        f: impl FnOnce(&mut ObjectStore) -> Result<R, InternalError> + Send,
    ) -> Result<R, InternalError> {
        self.ensure_open()?;

        let mut databases = self.registry.databases.write().await;
        let store = databases
            .get_mut(&self.db_name)
            .and_then(|db| db.stores.get_mut(&self.store_name))
            .ok_or_else(|| InternalError::store_not_open(&self.qualified))?;

        f(store)
    }
}

#[async_trait]
impl StorageBackend for IndexedBackend {
    fn name(&self) -> &str {
        &self.qualified
    }

    fn id_key(&self) -> &str {
        &self.id_key
    }

    async fn init(&self, upgrade: Option<&UpgradeHook>) -> Result<(), InternalError> {
        let mut databases = self.registry.databases.write().await;
        let db = databases.entry(self.db_name.clone()).or_default();

        if self.version < db.version {
            return Err(InternalError::store_unsupported(format!(
                "cannot open database '{}' at version {}: stored version is {}",
                self.db_name, self.version, db.version
            )));
        }

        if self.version > db.version {
            let old = db.version;
            db.stores.entry(self.store_name.clone()).or_default();
            if let Some(hook) = upgrade {
                hook(old, self.version);
            }
            db.version = self.version;

            tracing::debug!(
                store = %self.qualified,
                old_version = old,
                new_version = self.version,
                "indexed database upgraded"
            );
        } else {
            db.stores.entry(self.store_name.clone()).or_default();
        }

        self.opened.store(true, Ordering::Release);

        Ok(())
    }

    async fn insert(&self, mut record: Record) -> Result<Value, InternalError> {
        let id = record.field(&self.id_key).clone();
        if !id.is_null() {
            self.check_key(&id)?;
        }

        let id_key = self.id_key.clone();
        let qualified = self.qualified.clone();

        self.with_store(move |store| {
            let id = if id.is_null() {
                let next = store
                    .next_key
                    .ok_or_else(|| InternalError::store_ids_exhausted(&qualified))?;
                let generated = Value::Int(next);
                record.insert(id_key, generated.clone());
                generated
            } else {
                id
            };

            let key = ValueKey::new(id.clone());
            if store.rows.contains_key(&key) {
                return Err(InternalError::store_conflict(&qualified, id.to_text_lossy()));
            }

            store.observe_key(&id);
            store.rows.insert(key, record);

            Ok(id)
        })
        .await
    }

    async fn update(&self, id: &Value, mut record: Record) -> Result<bool, InternalError> {
        record.insert(self.id_key.clone(), id.clone());
        let key = ValueKey::new(id.clone());

        self.with_store(move |store| match store.rows.get_mut(&key) {
            Some(slot) => {
                *slot = record;
                Ok(true)
            }
            None => Ok(false),
        })
        .await
    }

    async fn delete(&self, id: &Value) -> Result<bool, InternalError> {
        let key = ValueKey::new(id.clone());

        self.with_store(move |store| {
            store.rows.remove(&key);
            Ok(true)
        })
        .await
    }

    async fn fetch_all(&self) -> Result<Vec<Record>, InternalError> {
        self.ensure_open()?;

        let databases = self.registry.databases.read().await;
        let rows = databases
            .get(&self.db_name)
            .and_then(|db| db.stores.get(&self.store_name))
            .map(|store| store.rows.values().cloned().collect())
            .unwrap_or_default();

        Ok(rows)
    }

    async fn clear(&self) -> Result<bool, InternalError> {
        self.with_store(|store| {
            store.rows.clear();
            Ok(true)
        })
        .await
    }
}
