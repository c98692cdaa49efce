//! Per-user key/value storage.
//!
//! The engine only ever stores opaque strings under a handful of well-known keys
//! (see [`crate::constants`]). Each `set` replaces the whole value for its key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{CalMirrorError, CalMirrorResult};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, user_id: &str, key: &str) -> CalMirrorResult<Option<String>>;
    async fn set(&self, user_id: &str, key: &str, value: &str) -> CalMirrorResult<()>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, user_id: &str, key: &str) -> CalMirrorResult<()>;
}

/// In-process store, used by tests and single-run tools.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, user_id: &str, key: &str) -> CalMirrorResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| CalMirrorError::Store("memory store poisoned".into()))?;
        Ok(values.get(&(user_id.to_string(), key.to_string())).cloned())
    }

    async fn set(&self, user_id: &str, key: &str, value: &str) -> CalMirrorResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CalMirrorError::Store("memory store poisoned".into()))?;
        values.insert((user_id.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn delete(&self, user_id: &str, key: &str) -> CalMirrorResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CalMirrorError::Store("memory store poisoned".into()))?;
        values.remove(&(user_id.to_string(), key.to_string()));
        Ok(())
    }
}

/// One file per user and key under a root directory:
/// `<root>/<user>/<key>`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(path_segment(user_id))
    }

    fn path(&self, user_id: &str, key: &str) -> PathBuf {
        self.user_dir(user_id).join(path_segment(key))
    }
}

/// Make an identifier safe to use as a single path component.
pub fn path_segment(s: &str) -> String {
    s.replace(['/', '\\', ':', '.'], "_")
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, user_id: &str, key: &str) -> CalMirrorResult<Option<String>> {
        match tokio::fs::read_to_string(self.path(user_id, key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, user_id: &str, key: &str, value: &str) -> CalMirrorResult<()> {
        let dir = self.user_dir(user_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.path(user_id, key);
        let temp = dir.join(format!("{}.tmp", path_segment(key)));

        // Rename is atomic on the same filesystem, so readers never see half a value
        tokio::fs::write(&temp, value).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str, key: &str) -> CalMirrorResult<()> {
        match tokio::fs::remove_file(self.path(user_id, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
