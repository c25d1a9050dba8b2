//! Keyed JSON blob storage mirroring each collection.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::DashboardResult;

pub const COURSES_KEY: &str = "cp_courses";
pub const SALES_KEY: &str = "cp_sales";
pub const ADS_KEY: &str = "cp_ads";

/// A flat key to text store, one blob per collection.
pub trait BlobStorage: Send + Sync {
    fn read(&self, key: &str) -> DashboardResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> DashboardResult<()>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> DashboardResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStorage for FileStorage {
    fn read(&self, key: &str) -> DashboardResult<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> DashboardResult<()> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(key, bytes = value.len(), "blob written");
        Ok(())
    }
}

/// Process-local storage, used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(self, key: &str, value: &str) -> Self {
        self.lock().insert(key.to_string(), value.to_string());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds complete strings.
        self.blobs.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl BlobStorage for MemoryStorage {
    fn read(&self, key: &str) -> DashboardResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> DashboardResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Reads a collection, returning `None` when the blob is absent or unreadable.
pub fn load_collection<T: DeserializeOwned>(storage: &dyn BlobStorage, key: &str) -> Option<Vec<T>> {
    let text = match storage.read(key) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "failed to read blob, using defaults");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(items) => Some(items),
        Err(e) => {
            warn!(key, error = %e, "unparseable blob, using defaults");
            None
        }
    }
}

pub fn save_collection<T: Serialize>(storage: &dyn BlobStorage, key: &str, items: &[T]) -> DashboardResult<()> {
    let text = serde_json::to_string(items)?;
    storage.write(key, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Round;

    #[test]
    fn file_storage_round_trips_and_reports_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("nested")).unwrap();
        assert_eq!(storage.read(SALES_KEY).unwrap(), None);

        storage.write(SALES_KEY, "[]").unwrap();
        assert_eq!(storage.read(SALES_KEY).unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("nested/cp_sales.json").exists());
        assert!(!dir.path().join("nested/cp_sales.json.tmp").exists());
    }

    #[test]
    fn garbage_blob_loads_as_none() {
        let storage = MemoryStorage::new().with_blob(ADS_KEY, "{not json");
        assert!(load_collection::<Round>(&storage, ADS_KEY).is_none());
        assert!(load_collection::<Round>(&storage, SALES_KEY).is_none());
    }

    #[test]
    fn saved_collection_loads_back() {
        let storage = MemoryStorage::new();
        let rounds = vec![Round {
            id: "1".into(),
            name: "October".into(),
            start_date: "2024-10-01".into(),
        }];
        save_collection(&storage, COURSES_KEY, &rounds).unwrap();
        let loaded: Vec<Round> = load_collection(&storage, COURSES_KEY).unwrap();
        assert_eq!(loaded, rounds);
    }
}
