//! Shared fixtures for SimpliSafe integration tests
//!
//! Fakes are handed to the flow as capabilities; nothing global is patched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ha_components::simplisafe::{
    self, AuthToken, AuthenticationError, CredentialValidator, Credentials, LegacyTokenPolicy,
    LegacyTokenSource, SimpliSafeFlowHandler, DOMAIN,
};
use ha_config_entries::{ConfigEntries, ConfigEntry, ConfigEntrySource, FlowContext, FlowManager};
use ha_storage::{Storage, StorageResult};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const USERNAME: &str = "user@email.com";
pub const PASSWORD: &str = "password";
pub const CLOUD_TOKEN: &str = "12345abc";
pub const STORED_TOKEN: &str = "12345";

/// Credentials used by most tests
pub fn conf() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

/// The same credentials as flow input
pub fn conf_json() -> Value {
    json!({"username": USERNAME, "password": PASSWORD})
}

/// Validator that always answers the same way
pub struct MockValidator {
    outcome: Result<AuthToken, AuthenticationError>,
    calls: AtomicUsize,
}

impl MockValidator {
    /// Accepts any credentials and returns `token`
    pub fn accepting(token: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(AuthToken::new(token)),
            calls: AtomicUsize::new(0),
        })
    }

    /// Rejects every login with `error`
    pub fn rejecting(error: AuthenticationError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialValidator for MockValidator {
    async fn authenticate(
        &self,
        _username: &str,
        _password: &str,
    ) -> Result<AuthToken, AuthenticationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give other flows a chance to run, like a real request would
        tokio::task::yield_now().await;
        self.outcome.clone()
    }
}

/// Legacy token source with a fixed answer
pub struct MockLegacyTokens {
    token: Option<AuthToken>,
    reads: AtomicUsize,
}

impl MockLegacyTokens {
    pub fn with_token(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(AuthToken::new(token)),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LegacyTokenSource for MockLegacyTokens {
    async fn read_legacy_token(&self) -> StorageResult<Option<AuthToken>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

/// A config directory with a registry and a flow manager
pub struct TestHass {
    pub config_dir: TempDir,
    pub entries: Arc<ConfigEntries>,
    pub flows: FlowManager,
}

impl TestHass {
    pub fn new() -> Self {
        let config_dir = TempDir::new().unwrap();
        let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(
            config_dir.path(),
        ))));
        let flows = FlowManager::new(entries.clone());
        Self {
            config_dir,
            entries,
            flows,
        }
    }

    /// Register the SimpliSafe flow with the given fakes
    pub fn with_simplisafe(
        self,
        validator: Arc<dyn CredentialValidator>,
        legacy: Arc<dyn LegacyTokenSource>,
        policy: LegacyTokenPolicy,
    ) -> Self {
        simplisafe::register_config_flow(&self.flows, validator, legacy, policy);
        self
    }

    /// A handler driven directly, without the flow manager
    pub fn flow(
        &self,
        validator: Arc<dyn CredentialValidator>,
        legacy: Arc<dyn LegacyTokenSource>,
    ) -> SimpliSafeFlowHandler {
        SimpliSafeFlowHandler::new(
            FlowContext::new(ConfigEntrySource::User),
            self.entries.clone(),
            validator,
            legacy,
        )
    }

    pub fn simplisafe_entries(&self) -> Vec<ConfigEntry> {
        self.entries.get_by_domain(DOMAIN)
    }
}

/// Builder for entries that exist before a test starts
pub struct MockConfigEntry {
    entry: ConfigEntry,
}

impl MockConfigEntry {
    pub fn new(domain: &str) -> Self {
        Self {
            entry: ConfigEntry::new(domain, "Mock Title"),
        }
    }

    pub fn with_unique_id(mut self, unique_id: &str) -> Self {
        self.entry = self.entry.with_unique_id(unique_id);
        self
    }

    pub async fn add_to_hass(self, hass: &TestHass) -> ConfigEntry {
        hass.entries.add(self.entry).await.unwrap()
    }
}
