//! YAML configuration for SimpliSafe
//!
//! ```yaml
//! simplisafe:
//!   accounts:
//!     - username: user@email.com
//!       password: hunter2
//!   legacy_token_policy: trust
//! ```

use ha_config_entries::FlowError;
use serde::Deserialize;
use thiserror::Error;

use super::api::Credentials;
use super::DOMAIN;

/// SimpliSafe setup errors
#[derive(Debug, Error)]
pub enum SimpliSafeError {
    #[error("invalid simplisafe configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("config flow failed: {0}")]
    Flow(#[from] FlowError),
}

pub type SimpliSafeResult<T> = Result<T, SimpliSafeError>;

/// What the import step does with a token found in the legacy token file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyTokenPolicy {
    /// Use the stored token without logging in again
    #[default]
    Trust,
    /// Always log in with the configured credentials
    Ignore,
}

/// The `simplisafe:` section of `configuration.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimpliSafeConfig {
    /// Accounts to import
    #[serde(default)]
    pub accounts: Vec<Credentials>,

    #[serde(default)]
    pub legacy_token_policy: LegacyTokenPolicy,
}

impl SimpliSafeConfig {
    /// Parse the section's value; an empty section means defaults
    pub fn from_value(value: serde_yaml::Value) -> SimpliSafeResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Extract the section from a whole `configuration.yaml` document
    ///
    /// Returns `None` if the document has no `simplisafe:` key.
    pub fn from_yaml(document: &str) -> SimpliSafeResult<Option<Self>> {
        let root: serde_yaml::Value = serde_yaml::from_str(document)?;
        match root.get(DOMAIN) {
            Some(section) => Self::from_value(section.clone()).map(Some),
            None => Ok(None),
        }
    }
}
