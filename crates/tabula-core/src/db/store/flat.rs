use crate::{
    db::store::{StorageBackend, TextStore, UpgradeHook, next_numeric_id},
    error::InternalError,
    obs::{MetricsEvent, MetricsSink},
    record::Record,
    value::{Value, value_eq},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

///
/// Loaded
///
/// Outcome of decoding the persisted array. A corrupt payload is kept
/// distinct internally and surfaces to callers as an empty collection.
///

#[derive(Debug)]
pub(crate) enum Loaded {
    Fresh(Vec<Record>),
    Recovered { reason: String },
}

impl Loaded {
    pub(crate) fn decode(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Self::Fresh(Vec::new());
        };

        match serde_json::from_str::<Vec<Record>>(text) {
            Ok(rows) => Self::Fresh(rows),
            Err(err) => Self::Recovered {
                reason: err.to_string(),
            },
        }
    }
}

///
/// FlatBackend
///
/// Whole table as one JSON array under the `db:store` key of a
/// [`TextStore`]. Every mutation rewrites the full array.
///

pub struct FlatBackend {
    text: Arc<dyn TextStore>,
    sink: Arc<dyn MetricsSink>,
    key: String,
    id_key: String,
    write_lock: Mutex<()>,
}

impl FlatBackend {
    #[must_use]
    pub fn new(
        text: Arc<dyn TextStore>,
        sink: Arc<dyn MetricsSink>,
        key: impl Into<String>,
        id_key: impl Into<String>,
    ) -> Self {
        Self {
            text,
            sink,
            key: key.into(),
            id_key: id_key.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<Record>, InternalError> {
        let raw = self.text.get_item(&self.key).await?;

        match Loaded::decode(raw.as_deref()) {
            Loaded::Fresh(rows) => Ok(rows),
            Loaded::Recovered { reason } => {
                tracing::warn!(
                    store = %self.key,
                    %reason,
                    "persisted payload is corrupt; reading as empty"
                );
                self.sink
                    .record(MetricsEvent::CorruptPayload { table: &self.key });

                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, rows: &[Record]) -> Result<(), InternalError> {
        let text = serde_json::to_string(rows)?;

        self.text.set_item(&self.key, &text).await
    }

    fn position(&self, rows: &[Record], id: &Value) -> Option<usize> {
        rows.iter()
            .position(|row| value_eq(row.field(&self.id_key), id))
    }
}

#[async_trait]
impl StorageBackend for FlatBackend {
    fn name(&self) -> &str {
        &self.key
    }

    fn id_key(&self) -> &str {
        &self.id_key
    }

    async fn init(&self, _upgrade: Option<&UpgradeHook>) -> Result<(), InternalError> {
        let _guard = self.write_lock.lock().await;

        if self.text.get_item(&self.key).await?.is_none() {
            self.text.set_item(&self.key, "[]").await?;
        }

        Ok(())
    }

    async fn insert(&self, mut record: Record) -> Result<Value, InternalError> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load().await?;

        let mut id = record.field(&self.id_key).clone();
        if id.is_null() {
            let next = next_numeric_id(rows.iter().map(|row| row.field(&self.id_key)))
                .ok_or_else(|| InternalError::store_ids_exhausted(&self.key))?;
            id = Value::Int(next);
            record.insert(self.id_key.clone(), id.clone());
        }
        if self.position(&rows, &id).is_some() {
            return Err(InternalError::store_conflict(
                &self.key,
                id.to_text_lossy(),
            ));
        }

        rows.push(record);
        self.save(&rows).await?;

        Ok(id)
    }

    async fn update(&self, id: &Value, record: Record) -> Result<bool, InternalError> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load().await?;

        let Some(idx) = self.position(&rows, id) else {
            return Ok(false);
        };

        let mut merged = rows[idx].merged(&record);
        merged.insert(self.id_key.clone(), id.clone());
        rows[idx] = merged;
        self.save(&rows).await?;

        Ok(true)
    }

    async fn delete(&self, id: &Value) -> Result<bool, InternalError> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load().await?;

        let before = rows.len();
        rows.retain(|row| !value_eq(row.field(&self.id_key), id));
        if rows.len() != before {
            self.save(&rows).await?;
        }

        Ok(true)
    }

    async fn fetch_all(&self) -> Result<Vec<Record>, InternalError> {
        self.load().await
    }

    async fn clear(&self) -> Result<bool, InternalError> {
        let _guard = self.write_lock.lock().await;
        self.save(&[]).await?;

        Ok(true)
    }
}
