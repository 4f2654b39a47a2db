//! Loose JSON files
//!
//! Reads and writes standalone JSON files that live outside `.storage/`,
//! such as token files left behind by older installs.

use std::io;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::StorageResult;

/// Load a JSON file.
///
/// Returns `Ok(None)` if the file does not exist. Any other I/O failure and
/// any parse failure is returned as an error so the caller can decide how
/// lenient to be. Content that is not UTF-8 is a parse failure.
pub async fn load_json<T>(path: impl AsRef<Path>) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();

    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("JSON file not found: {:?}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let value = serde_json::from_slice(&content)?;
    debug!("Loaded JSON file: {:?}", path);
    Ok(Some(value))
}

/// Save a value as pretty-printed JSON.
///
/// Parent directories are created as needed. The content is written to
/// `<file>.tmp` and renamed into place.
pub async fn save_json<T>(path: impl AsRef<Path>, value: &T) -> StorageResult<()>
where
    T: Serialize + ?Sized,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let content = serde_json::to_string_pretty(value)?;
    let temp_path = temp_path_for(path);

    fs::write(&temp_path, &content).await?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    debug!("Saved JSON file: {:?}", path);
    Ok(())
}

/// Sibling temp file used while writing `path`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
