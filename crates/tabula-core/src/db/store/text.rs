use crate::error::InternalError;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;

///
/// TextStore
///
/// String key/value persistence used by the flat backend.
///

#[async_trait]
pub trait TextStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, InternalError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), InternalError>;

    async fn remove_item(&self, key: &str) -> Result<(), InternalError>;
}

///
/// MemoryTextStore
///

#[derive(Debug, Default)]
pub struct MemoryTextStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryTextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TextStore for MemoryTextStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, InternalError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), InternalError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());

        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), InternalError> {
        self.entries.write().await.remove(key);

        Ok(())
    }
}

///
/// FileTextStore
///
/// One file per key under a root directory. Writes go to a sibling temp
/// file first and are renamed into place.
///

#[derive(Clone, Debug)]
pub struct FileTextStore {
    root: PathBuf,
}

impl FileTextStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to its file; characters outside `[A-Za-z0-9_-]` become `_`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl TextStore for FileTextStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, InternalError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), InternalError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), InternalError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
