//! Key/value persistence for the session snapshot.
//!
//! Browser builds back this with local storage; native builds use
//! [`FileStorage`]. Everything stored here is wiped by a logout.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ClientError, ClientResult};

pub mod keys {
    pub const JWT: &str = "JWT_TOKEN";
    pub const USER: &str = "USER";
    pub const IS_ADMIN: &str = "IS_ADMIN";
    pub const CSRF: &str = "CSRF_TOKEN";
    pub const CURRENT_BABY: &str = "CURRENT_BABY_ID";
}

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;
    fn clear(&self) -> ClientResult<()>;
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClientResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| ClientError::Storage("storage lock poisoned".into()))
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}

/// JSON object on disk, rewritten on every mutation.
pub struct FileStorage {
    path: PathBuf,
    cache: MemoryStorage,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = MemoryStorage::new();

        if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| ClientError::Storage(format!("read {}: {}", path.display(), e)))?;
            if !raw.trim().is_empty() {
                let entries: BTreeMap<String, String> = serde_json::from_str(&raw)
                    .map_err(|e| ClientError::Storage(format!("parse {}: {}", path.display(), e)))?;
                *cache.lock()? = entries;
            }
        }

        Ok(Self { path, cache })
    }

    fn flush(&self) -> ClientResult<()> {
        let snapshot = self.cache.lock()?.clone();
        let raw = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, raw)
            .map_err(|e| ClientError::Storage(format!("write {}: {}", self.path.display(), e)))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key)
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.cache.set(key, value)?;
        self.flush()
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.cache.remove(key)?;
        self.flush()
    }

    fn clear(&self) -> ClientResult<()> {
        self.cache.clear()?;
        self.flush()
    }
}
