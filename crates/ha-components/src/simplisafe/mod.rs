//! SimpliSafe Integration
//!
//! Account setup for the SimpliSafe security system: the config flow that
//! turns a username and password into a stored refresh token, and the
//! import of accounts listed in `configuration.yaml`.

pub mod api;
pub mod config;
pub mod config_flow;
pub mod legacy;

pub use api::{AuthToken, AuthenticationError, CredentialValidator, Credentials};
pub use config::{LegacyTokenPolicy, SimpliSafeConfig, SimpliSafeError, SimpliSafeResult};
pub use config_flow::{SimpliSafeFlowHandler, ERROR_INVALID_CREDENTIALS};
pub use legacy::{LegacyTokenFile, LegacyTokenSource, LEGACY_TOKEN_FILENAME};

use std::sync::Arc;

use ha_config_entries::{ConfigEntrySource, ConfigFlow, FlowContext, FlowManager, FlowResult};
use ha_core::conf::{CONF_PASSWORD, CONF_USERNAME};
use tracing::{debug, info};

/// Integration domain
pub const DOMAIN: &str = "simplisafe";

/// Register the SimpliSafe config flow with a flow manager
pub fn register_config_flow(
    manager: &FlowManager,
    validator: Arc<dyn CredentialValidator>,
    legacy: Arc<dyn LegacyTokenSource>,
    legacy_policy: LegacyTokenPolicy,
) {
    let entries = manager.config_entries().clone();

    manager.register_handler(
        DOMAIN,
        Arc::new(move |context: FlowContext| {
            Box::new(
                SimpliSafeFlowHandler::new(
                    context,
                    entries.clone(),
                    validator.clone(),
                    legacy.clone(),
                )
                .with_legacy_policy(legacy_policy),
            ) as Box<dyn ConfigFlow>
        }),
    );
}

/// Start an import flow for every YAML account that has no entry yet
///
/// The flows run concurrently; their results come back in account order.
pub async fn async_setup(
    config: &SimpliSafeConfig,
    manager: &FlowManager,
) -> SimpliSafeResult<Vec<FlowResult>> {
    let entries = manager.config_entries();

    let imports: Vec<_> = config
        .accounts
        .iter()
        .filter(|account| {
            let configured = entries.has_unique_id(DOMAIN, &account.username);
            if configured {
                debug!("Skipping import of configured account {}", account.username);
            }
            !configured
        })
        .map(|account| {
            let mut data = serde_json::Map::new();
            data.insert(CONF_USERNAME.to_string(), account.username.clone().into());
            data.insert(CONF_PASSWORD.to_string(), account.password.clone().into());
            manager.async_init(
                DOMAIN,
                ConfigEntrySource::Import,
                Some(serde_json::Value::Object(data)),
            )
        })
        .collect();

    if !imports.is_empty() {
        info!("Importing {} SimpliSafe account(s) from YAML", imports.len());
    }

    futures::future::join_all(imports)
        .await
        .into_iter()
        .map(|result| result.map_err(SimpliSafeError::from))
        .collect()
}
