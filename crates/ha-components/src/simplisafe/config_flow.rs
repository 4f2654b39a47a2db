//! Config flow for SimpliSafe
//!
//! ```text
//! user:   (no input) → form
//!         credentials → already_configured? → abort
//!                     → login failed?       → form {base: invalid_credentials}
//!                     → create_entry {username, token}
//!
//! import: credentials → already_configured? → abort
//!                     → token file usable?  → create_entry (no login)
//!                     → continue as user step
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ha_config_entries::{
    parse_step_input, ConfigEntries, ConfigFlow, FlowContext, FlowError, FlowResult, FlowStep,
    FlowStepResult, FormField,
};
use ha_core::conf::{CONF_PASSWORD, CONF_TOKEN, CONF_USERNAME};
use ha_core::ERROR_BASE;
use serde_json::json;
use tracing::{debug, info};

use super::api::{AuthToken, CredentialValidator, Credentials};
use super::config::LegacyTokenPolicy;
use super::legacy::LegacyTokenSource;
use super::DOMAIN;

/// Form error when the cloud rejects the login or cannot be reached
pub const ERROR_INVALID_CREDENTIALS: &str = "invalid_credentials";

/// One SimpliSafe setup wizard
pub struct SimpliSafeFlowHandler {
    context: FlowContext,
    entries: Arc<ConfigEntries>,
    validator: Arc<dyn CredentialValidator>,
    legacy: Arc<dyn LegacyTokenSource>,
    legacy_policy: LegacyTokenPolicy,
}

impl SimpliSafeFlowHandler {
    pub fn new(
        context: FlowContext,
        entries: Arc<ConfigEntries>,
        validator: Arc<dyn CredentialValidator>,
        legacy: Arc<dyn LegacyTokenSource>,
    ) -> Self {
        Self {
            context,
            entries,
            validator,
            legacy,
            legacy_policy: LegacyTokenPolicy::default(),
        }
    }

    pub fn with_legacy_policy(mut self, policy: LegacyTokenPolicy) -> Self {
        self.legacy_policy = policy;
        self
    }

    fn data_schema() -> Vec<FormField> {
        vec![
            FormField::required(CONF_USERNAME, "string"),
            FormField::required(CONF_PASSWORD, "password"),
        ]
    }

    fn show_form(&self, errors: HashMap<String, String>) -> FlowResult {
        self.async_show_form(FlowStep::User, Self::data_schema(), errors)
    }

    fn create_entry(&self, username: &str, token: &AuthToken) -> FlowResult {
        let data = HashMap::from([
            (CONF_USERNAME.to_string(), json!(username)),
            (CONF_TOKEN.to_string(), json!(token.refresh_token())),
        ]);
        self.async_create_entry(username, data)
    }

    /// The username is the account's unique_id
    fn claim_unique_id(&mut self, username: &str) -> Option<FlowResult> {
        self.set_unique_id(username);
        let abort = self.abort_if_unique_id_configured();
        if abort.is_some() {
            debug!("SimpliSafe account {} is already configured", username);
        }
        abort
    }

    /// Handle a flow started by the user
    pub async fn async_step_user(&mut self, user_input: Option<Credentials>) -> FlowStepResult {
        let Some(credentials) = user_input else {
            return Ok(self.show_form(HashMap::new()));
        };

        if let Some(abort) = self.claim_unique_id(&credentials.username) {
            return Ok(abort);
        }

        let token = match self
            .validator
            .authenticate(&credentials.username, &credentials.password)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                debug!("SimpliSafe login failed for {}: {}", credentials.username, e);
                let errors = HashMap::from([(
                    ERROR_BASE.to_string(),
                    ERROR_INVALID_CREDENTIALS.to_string(),
                )]);
                return Ok(self.show_form(errors));
            }
        };

        Ok(self.create_entry(&credentials.username, &token))
    }

    /// Handle an account imported from YAML
    pub async fn async_step_import(&mut self, import_config: Credentials) -> FlowStepResult {
        if let Some(abort) = self.claim_unique_id(&import_config.username) {
            return Ok(abort);
        }

        if self.legacy_policy == LegacyTokenPolicy::Trust {
            if let Some(token) = self.legacy.read_legacy_token().await? {
                info!(
                    "Importing SimpliSafe account {} with its stored refresh token",
                    import_config.username
                );
                return Ok(self.create_entry(&import_config.username, &token));
            }
        }

        self.async_step_user(Some(import_config)).await
    }
}

#[async_trait]
impl ConfigFlow for SimpliSafeFlowHandler {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn context(&self) -> &FlowContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut FlowContext {
        &mut self.context
    }

    fn config_entries(&self) -> &ConfigEntries {
        &self.entries
    }

    async fn async_step(
        &mut self,
        step: FlowStep,
        input: Option<serde_json::Value>,
    ) -> FlowStepResult {
        let credentials: Option<Credentials> = parse_step_input(step, input)?;

        match step {
            FlowStep::User => self.async_step_user(credentials).await,
            FlowStep::Import => {
                let credentials = credentials.ok_or(FlowError::MissingInput(step))?;
                self.async_step_import(credentials).await
            }
        }
    }
}
