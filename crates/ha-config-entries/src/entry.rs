//! Config Entry types
//!
//! A ConfigEntry represents a single instance of an integration's configuration.

use chrono::{DateTime, Utc};
use ha_core::sources::{SOURCE_IMPORT, SOURCE_USER};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Source of the config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Configured via UI/API
    #[default]
    User,
    /// Imported from YAML config
    Import,
}

impl ConfigEntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigEntrySource::User => SOURCE_USER,
            ConfigEntrySource::Import => SOURCE_IMPORT,
        }
    }
}

impl fmt::Display for ConfigEntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g., "simplisafe")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    /// Immutable configuration data
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// Major schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Minor schema version
    #[serde(default = "default_minor_version")]
    pub minor_version: u32,

    /// Optional unique identifier for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    /// Origin type
    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

fn default_minor_version() -> u32 {
    1
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            version: 1,
            minor_version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            created_at: now,
            modified_at: now,
        }
    }

    /// Set entry data
    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Set unique_id
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Set source
    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    /// Set version
    pub fn with_version(mut self, version: u32, minor_version: u32) -> Self {
        self.version = version;
        self.minor_version = minor_version;
        self
    }

    /// Get a string value from the entry data
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_entry_new() {
        let entry = ConfigEntry::new("simplisafe", "user@email.com");
        assert_eq!(entry.domain, "simplisafe");
        assert_eq!(entry.title, "user@email.com");
        assert_eq!(entry.source, ConfigEntrySource::User);
        assert_eq!(entry.version, 1);
        assert!(entry.unique_id.is_none());
        assert!(!entry.entry_id.is_empty());
    }

    #[test]
    fn test_config_entry_builder() {
        let data = HashMap::from([("token".to_string(), json!("12345abc"))]);

        let entry = ConfigEntry::new("simplisafe", "user@email.com")
            .with_data(data)
            .with_unique_id("user@email.com")
            .with_source(ConfigEntrySource::Import);

        assert_eq!(entry.unique_id.as_deref(), Some("user@email.com"));
        assert_eq!(entry.source, ConfigEntrySource::Import);
        assert_eq!(entry.data_str("token"), Some("12345abc"));
        assert_eq!(entry.data_str("missing"), None);
    }

    #[test]
    fn test_source_strings() {
        assert_eq!(ConfigEntrySource::User.to_string(), "user");
        assert_eq!(ConfigEntrySource::Import.as_str(), "import");
        assert_eq!(
            serde_json::to_value(ConfigEntrySource::Import).unwrap(),
            json!("import")
        );
    }

    #[test]
    fn test_serde_defaults() {
        let parsed: ConfigEntry = serde_json::from_value(json!({
            "entry_id": "01J0000000000000000000000",
            "domain": "simplisafe",
            "title": "user@email.com"
        }))
        .unwrap();

        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.minor_version, 1);
        assert_eq!(parsed.source, ConfigEntrySource::User);
        assert!(parsed.data.is_empty());
    }
}
