//! Legacy token file
//!
//! Installs that predate config entries kept the SimpliSafe refresh token in
//! a small JSON file in the config directory:
//!
//! ```json
//! {"refresh_token": "<token>"}
//! ```
//!
//! Importing that token avoids asking the cloud for a new one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ha_storage::{load_json, StorageError, StorageResult};
use serde::Deserialize;
use tracing::{debug, warn};

use super::api::AuthToken;

/// File name of the token file inside the config directory
pub const LEGACY_TOKEN_FILENAME: &str = ".simplisafe";

/// Somewhere a previously issued refresh token may be found
#[async_trait]
pub trait LegacyTokenSource: Send + Sync {
    /// Recover the token, `None` if there is nothing usable
    ///
    /// Only unexpected I/O failures are errors.
    async fn read_legacy_token(&self) -> StorageResult<Option<AuthToken>>;
}

#[derive(Deserialize)]
struct LegacyTokenData {
    refresh_token: String,
}

/// Token file on disk
#[derive(Debug, Clone)]
pub struct LegacyTokenFile {
    path: PathBuf,
}

impl LegacyTokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The token file at its usual place in `config_dir`
    pub fn in_config_dir(config_dir: impl AsRef<Path>) -> Self {
        Self::new(config_dir.as_ref().join(LEGACY_TOKEN_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LegacyTokenSource for LegacyTokenFile {
    async fn read_legacy_token(&self) -> StorageResult<Option<AuthToken>> {
        let data: LegacyTokenData = match load_json(&self.path).await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(StorageError::Json(e)) => {
                warn!("Ignoring malformed token file {:?}: {}", self.path, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match AuthToken::parse(&data.refresh_token) {
            Some(token) => {
                debug!("Recovered refresh token from {:?}", self.path);
                Ok(Some(token))
            }
            None => {
                warn!("Ignoring unusable refresh token in {:?}", self.path);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_token_file(dir: &TempDir, content: &str) -> LegacyTokenFile {
        let file = LegacyTokenFile::in_config_dir(dir.path());
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_token() {
        let dir = TempDir::new().unwrap();
        let file = write_token_file(&dir, r#"{"refresh_token": "12345"}"#);

        let token = file.read_legacy_token().await.unwrap().unwrap();
        assert_eq!(token.refresh_token(), "12345");
    }

    #[tokio::test]
    async fn test_extra_fields_are_fine() {
        let dir = TempDir::new().unwrap();
        let file = write_token_file(&dir, r#"{"refresh_token": "12345", "user_id": 1}"#);

        assert!(file.read_legacy_token().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let file = LegacyTokenFile::in_config_dir(dir.path());

        assert!(file.read_legacy_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_is_absent() {
        let dir = TempDir::new().unwrap();

        for content in ["{not json", "[]", r#"{"token": "12345"}"#, r#"{"refresh_token": 12345}"#] {
            let file = write_token_file(&dir, content);
            assert!(
                file.read_legacy_token().await.unwrap().is_none(),
                "expected no token for {}",
                content
            );
        }
    }

    #[tokio::test]
    async fn test_non_utf8_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let file = LegacyTokenFile::in_config_dir(dir.path());
        std::fs::write(file.path(), b"{\"refresh_token\": \"\xff\xfe\"}").unwrap();

        assert!(file.read_legacy_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_token_is_absent() {
        let dir = TempDir::new().unwrap();
        let file = write_token_file(&dir, r#"{"refresh_token": ""}"#);

        assert!(file.read_legacy_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_path_is_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be
        let file = LegacyTokenFile::new(dir.path());

        assert!(matches!(
            file.read_legacy_token().await,
            Err(StorageError::Io(_))
        ));
    }
}
