//! Versioned JSON persistence in the `.storage/` directory
//!
//! Every persisted collection (config entries, devices) is a [`Storable`]
//! type written inside a [`StorageFile`] envelope:
//!
//! ```json
//! {
//!   "version": 1,
//!   "minor_version": 1,
//!   "key": "core.config_entries",
//!   "data": { ... }
//! }
//! ```

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Migration required for {key}: from {from} to {to}")]
    MigrationRequired { key: String, from: u32, to: u32 },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A type persisted under a fixed storage key
pub trait Storable: Serialize + DeserializeOwned {
    /// Storage key (file name under `.storage/`)
    const KEY: &'static str;
    /// Current major version; a mismatch requires migration
    const VERSION: u32;
    /// Current minor version; older files are read with a warning
    const MINOR_VERSION: u32;
}

/// Envelope written around stored data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    pub version: u32,
    pub minor_version: u32,
    pub key: String,
    pub data: T,
}

/// Handle on the `.storage/` directory of a config dir
///
/// Clones share the per-key write locks, so saves of one key never
/// interleave their temp-file writes.
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
    write_locks: Arc<DashMap<&'static str, Arc<Mutex<()>>>>,
}

impl Storage {
    /// Create a storage handle rooted at `config_dir/.storage`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
            write_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    /// Whether a file exists for the key
    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).exists()
    }

    /// Load stored data, `None` when nothing has been saved yet
    pub async fn load<T: Storable>(&self) -> StorageResult<Option<T>> {
        let path = self.file_path(T::KEY);
        if !path.exists() {
            debug!("Storage file not found: {}", T::KEY);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let file: StorageFile<serde_json::Value> = serde_json::from_str(&content)?;

        if file.version != T::VERSION {
            return Err(StorageError::MigrationRequired {
                key: T::KEY.to_string(),
                from: file.version,
                to: T::VERSION,
            });
        }
        if file.minor_version < T::MINOR_VERSION {
            warn!(
                "Storage {} has older minor version ({} < {})",
                T::KEY,
                file.minor_version,
                T::MINOR_VERSION
            );
        }

        let data = serde_json::from_value(file.data)?;
        debug!(
            "Loaded storage file: {} (v{}.{})",
            T::KEY,
            file.version,
            file.minor_version
        );
        Ok(Some(data))
    }

    fn write_lock(&self, key: &'static str) -> Arc<Mutex<()>> {
        self.write_locks.entry(key).or_default().clone()
    }

    /// Save data atomically (temp file, then rename)
    pub async fn save<T: Storable>(&self, data: &T) -> StorageResult<()> {
        let lock = self.write_lock(T::KEY);
        let _guard = lock.lock().await;
        if !self.storage_dir.exists() {
            fs::create_dir_all(&self.storage_dir).await?;
        }

        let file = StorageFile {
            version: T::VERSION,
            minor_version: T::MINOR_VERSION,
            key: T::KEY.to_string(),
            data,
        };
        let content = serde_json::to_string_pretty(&file)?;

        let path = self.file_path(T::KEY);
        let temp_path = self.file_path(&format!("{}.tmp", T::KEY));
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Saved storage file: {}", T::KEY);
        Ok(())
    }

    /// Delete the file for a key, if present
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.file_path(key);
        if path.exists() {
            fs::remove_file(&path).await?;
            debug!("Deleted storage file: {}", key);
        }
        Ok(())
    }
}
