//! SimpliSafe authentication types
//!
//! The cloud client itself lives outside this crate; the config flow only
//! needs something that turns a username and password into a refresh token.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Login failure reported by the SimpliSafe cloud
///
/// The config flow does not distinguish between the variants; both end up
/// as `invalid_credentials` on the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("Invalid username/password")]
    InvalidCredentials,

    #[error("Request failed: {0}")]
    Request(String),
}

/// Username and password entered by the user or read from YAML
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Long-lived refresh token issued by the SimpliSafe cloud
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    refresh_token: String,
}

impl AuthToken {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
        }
    }

    /// Accept a token recovered from disk if it looks like one
    ///
    /// Tokens are opaque; only empty values and values containing
    /// whitespace are rejected.
    pub fn parse(refresh_token: &str) -> Option<Self> {
        if refresh_token.is_empty() || refresh_token.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self::new(refresh_token))
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Logs in to the SimpliSafe cloud
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Exchange a username and password for a refresh token
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthToken, AuthenticationError>;
}
