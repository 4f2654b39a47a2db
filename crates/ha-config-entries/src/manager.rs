//! Config Entries Manager
//!
//! Owns every configuration entry and enforces that no two entries of a
//! domain share a unique_id.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ha_storage::{Storable, Storage, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::entry::ConfigEntry;

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 5;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    /// All config entries
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Config Entries Manager
///
/// Keeps three indexes in step:
/// - entry_id -> entry
/// - domain -> entry_ids
/// - (domain, unique_id) -> entry_id
///
/// The unique_id index is claimed first when adding, so the duplicate check
/// and the insert are a single step even with concurrent callers.
pub struct ConfigEntries {
    /// Storage backend
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Serializes writers so only one temp file is in flight
    save_lock: Mutex<()>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            save_lock: Mutex::new(()),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load_data::<ConfigEntriesData>().await? {
            info!("Loading {} config entries from storage", data.entries.len());

            for entry in data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let _lock = self.save_lock.lock().await;

        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };

        self.storage.save(&data.to_storage_file()).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    /// Index an entry unconditionally (used when loading trusted storage)
    fn index_entry(&self, entry: &ConfigEntry) {
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id.insert(
                (entry.domain.clone(), unique_id.clone()),
                entry.entry_id.clone(),
            );
        }
        self.index_primary(entry);
    }

    /// Index an entry, failing if its unique_id is already taken
    fn try_index_entry(&self, entry: &ConfigEntry) -> ConfigEntriesResult<()> {
        if let Some(ref unique_id) = entry.unique_id {
            match self
                .by_unique_id
                .entry((entry.domain.clone(), unique_id.clone()))
            {
                Entry::Occupied(_) => {
                    return Err(ConfigEntriesError::AlreadyExists {
                        domain: entry.domain.clone(),
                        unique_id: unique_id.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.entry_id.clone());
                }
            }
        }
        self.index_primary(entry);
        Ok(())
    }

    fn index_primary(&self, entry: &ConfigEntry) {
        self.entries.insert(entry.entry_id.clone(), entry.clone());
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
    }

    /// Remove an entry from indexes
    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let ids: Vec<String> = self
            .by_domain
            .get(domain)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .map(|r| r.value().clone())?;
        self.get(&entry_id)
    }

    /// Check whether a unique_id is taken for a domain
    pub fn has_unique_id(&self, domain: &str, unique_id: &str) -> bool {
        self.by_unique_id
            .contains_key(&(domain.to_string(), unique_id.to_string()))
    }

    /// Add a new config entry
    ///
    /// Fails with [`ConfigEntriesError::AlreadyExists`] if another entry of
    /// the same domain has the same unique_id. If saving fails the entry is
    /// removed again.
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        self.try_index_entry(&entry)?;

        if let Err(e) = self.save().await {
            self.unindex_entry(&entry);
            return Err(e.into());
        }

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Remove an entry
    ///
    /// If saving fails the entry is indexed again.
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);
        if let Err(e) = self.save().await {
            self.index_entry(&entry);
            return Err(e.into());
        }

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
