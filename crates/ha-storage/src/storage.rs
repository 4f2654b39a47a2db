//! Versioned `.storage/` files
//!
//! Every file under `.storage/` wraps its payload with the key and the
//! schema version it was written with:
//!
//! ```json
//! {
//!   "version": 1,
//!   "minor_version": 5,
//!   "key": "core.config_entries",
//!   "data": { ... }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::json::{load_json, save_json};

/// Storage file wrapper with version tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    /// Major version - breaking changes
    pub version: u32,
    /// Minor version - additive changes within a major version
    pub minor_version: u32,
    /// Storage key (file name)
    pub key: String,
    /// The payload
    pub data: T,
}

impl<T> StorageFile<T> {
    pub fn new(key: impl Into<String>, data: T, version: u32, minor_version: u32) -> Self {
        Self {
            version,
            minor_version,
            key: key.into(),
            data,
        }
    }
}

/// Types persisted under a fixed `.storage/` key
pub trait Storable: Serialize + DeserializeOwned {
    /// Storage key for this type
    const KEY: &'static str;
    /// Current major version
    const VERSION: u32;
    /// Current minor version
    const MINOR_VERSION: u32;

    /// Wrap a copy of `self` for saving
    fn to_storage_file(&self) -> StorageFile<Self>
    where
        Self: Clone,
    {
        StorageFile::new(Self::KEY, self.clone(), Self::VERSION, Self::MINOR_VERSION)
    }
}

/// Handle on a config directory's `.storage/` folder
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    /// Create a storage handle rooted at `<config_dir>/.storage`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
        }
    }

    /// Get the file path for a storage key
    pub fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    /// Load a storage file, `None` if it has never been written
    pub async fn load<T>(&self, key: &str) -> StorageResult<Option<StorageFile<T>>>
    where
        T: DeserializeOwned,
    {
        let storage_file: Option<StorageFile<T>> = load_json(self.file_path(key)).await?;

        if let Some(ref file) = storage_file {
            debug!(
                "Loaded storage file: {} (v{}.{})",
                key, file.version, file.minor_version
            );
        }

        Ok(storage_file)
    }

    /// Load the data of a [`Storable`], rejecting files from another major version
    pub async fn load_data<T>(&self) -> StorageResult<Option<T>>
    where
        T: Storable,
    {
        let Some(file) = self.load::<T>(T::KEY).await? else {
            return Ok(None);
        };

        if file.version != T::VERSION {
            return Err(StorageError::VersionMismatch {
                key: T::KEY.to_string(),
                expected: T::VERSION,
                found: file.version,
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

        Ok(Some(file.data))
    }

    /// Save a storage file atomically
    pub async fn save<T>(&self, storage_file: &StorageFile<T>) -> StorageResult<()>
    where
        T: Serialize,
    {
        save_json(self.file_path(&storage_file.key), storage_file).await?;

        debug!(
            "Saved storage file: {} (v{}.{})",
            storage_file.key, storage_file.version, storage_file.minor_version
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    impl Storable for TestData {
        const KEY: &'static str = "test.data";
        const VERSION: u32 = 1;
        const MINOR_VERSION: u32 = 1;
    }

    fn sample() -> TestData {
        TestData {
            name: "test".to_string(),
            value: 42,
        }
    }

    #[tokio::test]
    async fn test_storage_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());

        storage.save(&sample().to_storage_file()).await.unwrap();
        assert!(temp_dir.path().join(".storage").join("test.data").exists());

        let loaded: StorageFile<TestData> = storage.load("test.data").await.unwrap().unwrap();
        assert_eq!(loaded.data, sample());
        assert_eq!(loaded.key, "test.data");
        assert_eq!(loaded.version, 1);

        assert_eq!(storage.load_data::<TestData>().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_storage_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());

        let result: Option<StorageFile<TestData>> = storage.load("nonexistent").await.unwrap();
        assert!(result.is_none());
        assert!(storage.load_data::<TestData>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_data_version_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());

        storage
            .save(&StorageFile::new("test.data", sample(), 2, 1))
            .await
            .unwrap();

        let result = storage.load_data::<TestData>().await;
        assert!(matches!(
            result,
            Err(StorageError::VersionMismatch {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }
}
