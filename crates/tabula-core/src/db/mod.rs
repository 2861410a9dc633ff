//! Module: db
//! Responsibility: the table environment and everything a table is built
//! from (backends, predicates, query state, SQL).
//! Boundary: the `Environment` is the only place backends are constructed;
//! there is no process-global registry.

pub mod config;
pub mod predicate;
pub mod query;
pub mod sql;
pub mod store;
pub mod table;


use crate::{
    db::{
        config::{BackendKind, StoreConfig},
        store::{
            FlatBackend, IndexedBackend, IndexedRegistry, MemoryTextStore, StorageBackend,
            TextStore, UpgradeHook,
        },
    },
    error::InternalError,
    obs::{MetricsSink, NoopMetricsSink},
};
use std::{fmt, sync::Arc};

// re-exports
pub use table::Table;

///
/// Environment
///
/// Owns the shared backend resources: the indexed registry, the text store
/// behind flat tables, and the metrics sink every table reports to.
///

#[derive(Clone)]
pub struct Environment {
    indexed: Arc<IndexedRegistry>,
    text: Arc<dyn TextStore>,
    sink: Arc<dyn MetricsSink>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("indexed", &self.indexed)
            .finish_non_exhaustive()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Environment {
    /// Fully in-memory environment with a discarding metrics sink.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTextStore::new()))
    }

    /// Environment whose flat tables persist through `text`.
    #[must_use]
    pub fn new(text: Arc<dyn TextStore>) -> Self {
        Self {
            indexed: Arc::new(IndexedRegistry::new()),
            text,
            sink: Arc::new(NoopMetricsSink),
        }
    }

    #[must_use]
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_indexed_registry(mut self, registry: Arc<IndexedRegistry>) -> Self {
        self.indexed = registry;
        self
    }

    #[must_use]
    pub const fn indexed_registry(&self) -> &Arc<IndexedRegistry> {
        &self.indexed
    }

    #[must_use]
    pub const fn text_store(&self) -> &Arc<dyn TextStore> {
        &self.text
    }

    /// Build the backend a config describes, without initializing it.
    #[must_use]
    pub fn backend(&self, config: &StoreConfig) -> Arc<dyn StorageBackend> {
        match config.backend {
            BackendKind::Indexed => Arc::new(IndexedBackend::new(
                self.indexed.clone(),
                config.db_name.clone(),
                config.store_name.clone(),
                config.id_key.clone(),
                config.version,
            )),
            BackendKind::Flat => Arc::new(FlatBackend::new(
                self.text.clone(),
                self.sink.clone(),
                config.qualified_name(),
                config.id_key.clone(),
            )),
        }
    }

    /// Build, initialize and wrap a backend in a fresh [`Table`].
    pub async fn open(
        &self,
        config: &StoreConfig,
        upgrade: Option<&UpgradeHook>,
    ) -> Result<Table, InternalError> {
        let table = Table::new(self.backend(config)).with_metrics_sink(self.sink.clone());
        table.init(upgrade).await?;

        tracing::debug!(
            table = %table.name(),
            backend = ?config.backend,
            version = config.version,
            "table opened"
        );

        Ok(table)
    }
}
