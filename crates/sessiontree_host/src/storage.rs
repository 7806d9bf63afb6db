//! Key-value persistence for the session tree.
//!
//! Each key is a pretty-printed JSON document under the profile directory.
//! Writes go through a temp file and a rename, the previous three versions
//! are kept as backups, and a document that fails to parse is read back
//! from its newest backup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, StorageResult};

/// Key holding the serialized window list.
pub const SESSION_TREE_KEY: &str = "sessionTree";

/// Key holding the last bounds of the session tree popup.
pub const POPUP_BOUNDS_KEY: &str = "sessionTreeWindowConfig";

#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;
}

/// File-backed storage rooted at a profile directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    profile: String,
}

impl FileStorage {
    pub fn new(root: PathBuf, profile: impl Into<String>) -> Self {
        Self {
            root,
            profile: profile.into(),
        }
    }

    pub fn open_default_profile() -> Self {
        Self::new(default_storage_root(), "default")
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let profile_dir = self.root.join("profiles").join(&self.profile);
        profile_dir.join(format!("{key}.json"))
    }

    async fn load_from_backup(&self, path: &Path) -> Option<Value> {
        let backup_path = path.with_extension("json.bak");
        let data = fs::read_to_string(&backup_path).await.ok()?;
        serde_json::from_str::<Value>(&data).ok()
    }

    async fn rotate_backups(&self, path: &Path) {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return;
        }

        let bak2 = path.with_extension("json.bak.2");
        let bak1 = path.with_extension("json.bak.1");
        let bak = path.with_extension("json.bak");

        let _ = fs::remove_file(&bak2).await;
        if fs::try_exists(&bak1).await.unwrap_or(false) {
            let _ = fs::rename(&bak1, &bak2).await;
        }
        if fs::try_exists(&bak).await.unwrap_or(false) {
            let _ = fs::rename(&bak, &bak1).await;
        }
        let _ = fs::rename(path, &bak).await;
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let path = self.file_path(key);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::ReadError(e.to_string()))?;
        match serde_json::from_str::<Value>(&data) {
            Ok(value) => Ok(Some(value)),
            Err(parse_err) => {
                if let Some(backup) = self.load_from_backup(&path).await {
                    log::warn!("storage_backup_used key={} error={}", key, parse_err);
                    return Ok(Some(backup));
                }
                Err(StorageError::ParseError(parse_err.to_string()))
            }
        }
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let path = self.file_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteError(e.to_string()))?;
        }
        self.rotate_backups(&path).await;
        let content = serde_json::to_vec_pretty(&value)
            .map_err(|e| StorageError::SerializeError(e.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| StorageError::WriteError(e.to_string()))?;
        file.write_all(&content)
            .await
            .map_err(|e| StorageError::WriteError(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| StorageError::WriteError(e.to_string()))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StorageError::WriteError(e.to_string()))?;
        Ok(())
    }
}

pub fn default_storage_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| Path::new("/").to_path_buf())
        .join(".sessiontree")
}

/// In-memory storage, handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}
