//! Module: db::config
//! Responsibility: table construction options and their defaults.
//! Does not own: backend lifecycle or persistence layout.

use crate::{DEFAULT_ID_KEY, error::InternalError};
use serde::{Deserialize, Serialize};

///
/// BackendKind
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Versioned keyed store with native key generation.
    #[default]
    Indexed,
    /// JSON array persisted as one text payload.
    Flat,
}

///
/// StoreConfig
///
/// Options for opening a table. Unknown JSON keys are rejected.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub db_name: String,
    pub store_name: String,
    pub id_key: String,
    pub version: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Indexed,
            db_name: "UniversalDB".to_string(),
            store_name: "DefaultStore".to_string(),
            id_key: DEFAULT_ID_KEY.to_string(),
            version: 1,
        }
    }
}

impl StoreConfig {
    /// Config for `store_name` with every other option defaulted.
    #[must_use]
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            ..Self::default()
        }
    }

    /// Parse a config from JSON text; absent keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self, InternalError> {
        Ok(serde_json::from_str(text)?)
    }

    #[must_use]
    pub const fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    #[must_use]
    pub fn id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Qualified `db:store` name used for persistence keys and metrics.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.db_name, self.store_name)
    }
}
