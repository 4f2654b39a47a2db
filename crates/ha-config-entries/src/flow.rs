//! Config Flows
//!
//! A config flow is a short wizard that collects setup information for an
//! integration and ends in one of three results:
//!
//! ```text
//! start → form ⇄ (submit) → create_entry
//!                         ↘ abort
//! ```
//!
//! Integrations implement [`ConfigFlow`]; the [`FlowManager`](crate::FlowManager)
//! drives them and turns `create_entry` results into config entries.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use ha_core::sources::{SOURCE_IMPORT, SOURCE_USER};
use ha_storage::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::ConfigEntrySource;
use crate::manager::{ConfigEntries, ConfigEntriesError};

/// Abort reason when the flow's unique_id is already in use
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Errors that end a flow step without producing a result
///
/// Anything the user can fix is reported through a form instead.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("No config flow registered for {0}")]
    UnknownHandler(String),

    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Step {step} is not supported by {handler}")]
    UnsupportedStep { handler: String, step: FlowStep },

    #[error("Step {0} requires input")]
    MissingInput(FlowStep),

    #[error("Invalid input for step {step}: {source}")]
    InvalidInput {
        step: FlowStep,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config entries error: {0}")]
    ConfigEntries(#[from] ConfigEntriesError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type FlowStepResult<T = FlowResult> = Result<T, FlowError>;

/// Steps a flow can be asked to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    /// Interactive setup
    User,
    /// Non-interactive migration from YAML
    Import,
}

impl FlowStep {
    /// The step a flow starts at for a given source
    pub fn initial(source: ConfigEntrySource) -> Self {
        match source {
            ConfigEntrySource::User => FlowStep::User,
            ConfigEntrySource::Import => FlowStep::Import,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStep::User => SOURCE_USER,
            FlowStep::Import => SOURCE_IMPORT,
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowStep {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            SOURCE_USER => Ok(FlowStep::User),
            SOURCE_IMPORT => Ok(FlowStep::Import),
            other => Err(FlowError::UnknownStep(other.to_string())),
        }
    }
}

/// Kind of flow result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FormField {
    /// A required field without a default
    pub fn required(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            required: Some(true),
            default: None,
        }
    }
}

/// Result of a flow step, serialized the way the frontend expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowResult {
    /// Flow ID (assigned by the flow manager)
    pub flow_id: String,
    /// Handler (integration domain)
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    /// Step to render (form only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Fields of the form, empty for other result types
    pub data_schema: Vec<FormField>,
    /// Errors from the previous submission, field -> error code
    pub errors: Option<HashMap<String, String>>,
    /// Entry title (create_entry only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Entry data (create_entry only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, serde_json::Value>>,
    /// Entry schema version (create_entry only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// ID of the entry created from this result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    /// Abort reason (abort only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FlowResult {
    fn empty(handler: &str, result_type: FlowResultType) -> Self {
        Self {
            flow_id: String::new(),
            handler: handler.to_string(),
            result_type,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            title: None,
            data: None,
            version: None,
            entry_id: None,
            reason: None,
        }
    }

    /// Ask for (more) input at `step`
    pub fn form(
        handler: &str,
        step: FlowStep,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    ) -> Self {
        Self {
            step_id: Some(step.as_str().to_string()),
            data_schema,
            errors: Some(errors),
            ..Self::empty(handler, FlowResultType::Form)
        }
    }

    /// Finish the flow with a new config entry
    pub fn create_entry(
        handler: &str,
        title: impl Into<String>,
        data: HashMap<String, serde_json::Value>,
        version: u32,
    ) -> Self {
        Self {
            title: Some(title.into()),
            data: Some(data),
            version: Some(version),
            ..Self::empty(handler, FlowResultType::CreateEntry)
        }
    }

    /// Finish the flow without creating anything
    pub fn abort(handler: &str, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::empty(handler, FlowResultType::Abort)
        }
    }

    pub fn with_flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = flow_id.into();
        self
    }

    /// Whether the flow ends with this result
    pub fn is_finished(&self) -> bool {
        self.result_type != FlowResultType::Form
    }
}

/// Per-flow state shared between the manager and the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowContext {
    /// What started the flow
    pub source: ConfigEntrySource,
    /// Unique ID the created entry will carry
    pub unique_id: Option<String>,
}

impl FlowContext {
    pub fn new(source: ConfigEntrySource) -> Self {
        Self {
            source,
            unique_id: None,
        }
    }
}

/// An integration's config flow
///
/// One value per flow instance; the manager never shares it between flows.
#[async_trait]
pub trait ConfigFlow: Send + Sync {
    /// Integration domain
    fn domain(&self) -> &str;

    /// Schema version of entries created by this flow
    fn version(&self) -> u32 {
        1
    }

    fn context(&self) -> &FlowContext;

    fn context_mut(&mut self) -> &mut FlowContext;

    /// Registry used for duplicate checks
    fn config_entries(&self) -> &ConfigEntries;

    /// Run a step with raw (JSON) input
    async fn async_step(
        &mut self,
        step: FlowStep,
        input: Option<serde_json::Value>,
    ) -> FlowStepResult;

    /// Set the unique_id of the entry this flow will create
    fn set_unique_id(&mut self, unique_id: &str) {
        self.context_mut().unique_id = Some(unique_id.to_string());
    }

    /// Abort result if an entry with this flow's unique_id already exists
    fn abort_if_unique_id_configured(&self) -> Option<FlowResult> {
        let unique_id = self.context().unique_id.as_deref()?;
        if self.config_entries().has_unique_id(self.domain(), unique_id) {
            Some(FlowResult::abort(self.domain(), ABORT_ALREADY_CONFIGURED))
        } else {
            None
        }
    }

    fn async_show_form(
        &self,
        step: FlowStep,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    ) -> FlowResult {
        FlowResult::form(self.domain(), step, data_schema, errors)
    }

    fn async_create_entry(
        &self,
        title: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> FlowResult {
        FlowResult::create_entry(self.domain(), title, data, self.version())
    }
}

/// Deserialize optional step input into the handler's input type
pub fn parse_step_input<T>(step: FlowStep, input: Option<serde_json::Value>) -> FlowStepResult<Option<T>>
where
    T: DeserializeOwned,
{
    match input {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| FlowError::InvalidInput { step, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Input {
        username: String,
    }

    #[test]
    fn test_step_strings() {
        assert_eq!(FlowStep::User.to_string(), "user");
        assert_eq!("import".parse::<FlowStep>().unwrap(), FlowStep::Import);
        assert!(matches!(
            "reauth".parse::<FlowStep>(),
            Err(FlowError::UnknownStep(_))
        ));
    }

    #[test]
    fn test_initial_step_follows_source() {
        assert_eq!(FlowStep::initial(ConfigEntrySource::User), FlowStep::User);
        assert_eq!(
            FlowStep::initial(ConfigEntrySource::Import),
            FlowStep::Import
        );
    }

    #[test]
    fn test_form_serialization() {
        let result = FlowResult::form(
            "simplisafe",
            FlowStep::User,
            vec![FormField::required("username", "string")],
            HashMap::new(),
        )
        .with_flow_id("abc");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "form");
        assert_eq!(value["step_id"], "user");
        assert_eq!(value["flow_id"], "abc");
        assert_eq!(value["errors"], json!({}));
        assert_eq!(value["data_schema"][0]["name"], "username");
        assert!(value.get("title").is_none());
        assert!(!result.is_finished());
    }

    #[test]
    fn test_abort_serialization() {
        let result = FlowResult::abort("simplisafe", ABORT_ALREADY_CONFIGURED);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "abort");
        assert_eq!(value["reason"], "already_configured");
        assert!(value.get("step_id").is_none());
        assert!(result.is_finished());
    }

    #[test]
    fn test_parse_step_input() {
        let parsed: Option<Input> =
            parse_step_input(FlowStep::User, Some(json!({"username": "a"}))).unwrap();
        assert_eq!(
            parsed,
            Some(Input {
                username: "a".to_string()
            })
        );

        let absent: Option<Input> = parse_step_input(FlowStep::User, None).unwrap();
        assert!(absent.is_none());

        let null: Option<Input> = parse_step_input(FlowStep::User, Some(json!(null))).unwrap();
        assert!(null.is_none());

        let bad: FlowStepResult<Option<Input>> =
            parse_step_input(FlowStep::Import, Some(json!({"user": 1})));
        assert!(matches!(
            bad,
            Err(FlowError::InvalidInput {
                step: FlowStep::Import,
                ..
            })
        ));
    }
}
