//! Config Flow Manager
//!
//! Starts config flows, routes user input to the step a flow is waiting on,
//! and turns finished flows into config entries.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::entry::{ConfigEntry, ConfigEntrySource};
use crate::flow::{
    ConfigFlow, FlowContext, FlowError, FlowResult, FlowResultType, FlowStep, FlowStepResult,
    ABORT_ALREADY_CONFIGURED,
};
use crate::manager::{ConfigEntries, ConfigEntriesError};

/// Builds a fresh flow instance for a domain
pub type FlowFactory = Arc<dyn Fn(FlowContext) -> Box<dyn ConfigFlow> + Send + Sync + 'static>;

/// Summary of an in-progress flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowProgress {
    pub flow_id: String,
    pub handler: String,
    pub step_id: String,
    pub source: ConfigEntrySource,
}

/// An in-progress flow
struct ActiveFlow {
    /// Step the flow is waiting on
    step: FlowStep,
    /// Integration flow instance
    flow: Box<dyn ConfigFlow>,
}

/// Manages config flows for all integrations
///
/// Each flow sits behind its own lock, so a flow waiting on the network
/// never holds up other flows.
pub struct FlowManager {
    /// Registry that receives created entries
    entries: Arc<ConfigEntries>,

    /// Flow factories by domain
    handlers: DashMap<String, FlowFactory>,

    /// Flows waiting for input, by flow_id
    flows: DashMap<String, (FlowProgress, Arc<Mutex<ActiveFlow>>)>,
}

impl FlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            handlers: DashMap::new(),
            flows: DashMap::new(),
        }
    }

    /// Registry backing this manager
    pub fn config_entries(&self) -> &Arc<ConfigEntries> {
        &self.entries
    }

    /// Register the config flow of a domain
    pub fn register_handler(&self, domain: &str, factory: FlowFactory) {
        self.handlers.insert(domain.to_string(), factory);
        debug!("Registered config flow for domain: {}", domain);
    }

    /// Start a flow for `domain`
    ///
    /// The first step is chosen by `source`; `data` is passed to it as input.
    pub async fn async_init(
        &self,
        domain: &str,
        source: ConfigEntrySource,
        data: Option<serde_json::Value>,
    ) -> FlowStepResult {
        let factory = self
            .handlers
            .get(domain)
            .map(|r| r.value().clone())
            .ok_or_else(|| FlowError::UnknownHandler(domain.to_string()))?;

        let flow_id = Ulid::new().to_string();
        let step = FlowStep::initial(source);
        let mut active = ActiveFlow {
            step,
            flow: factory(FlowContext::new(source)),
        };

        debug!("Starting {} flow {} for {}", source, flow_id, domain);

        let result = self.run_step(&flow_id, &mut active, step, data).await?;
        if !result.is_finished() {
            self.store_flow(&flow_id, domain, source, &result, active)?;
        }

        Ok(result)
    }

    /// Continue a flow that is showing a form
    pub async fn async_configure(
        &self,
        flow_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> FlowStepResult {
        let (progress, slot) = self
            .flows
            .get(flow_id)
            .map(|r| (r.value().0.clone(), r.value().1.clone()))
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let mut active = slot.lock().await;
        if !self.flows.contains_key(flow_id) {
            // Finished by a concurrent call while we waited for the lock
            return Err(FlowError::UnknownFlow(flow_id.to_string()));
        }

        let step = active.step;
        let result = self.run_step(flow_id, &mut active, step, user_input).await;

        match result {
            Ok(ref r) if !r.is_finished() => {
                if let Some(step_id) = &r.step_id {
                    active.step = step_id.parse()?;
                    if let Some(mut entry) = self.flows.get_mut(flow_id) {
                        entry.value_mut().0.step_id = step_id.clone();
                    }
                }
            }
            _ => {
                self.flows.remove(flow_id);
                debug!("Flow {} for {} finished", flow_id, progress.handler);
            }
        }

        result
    }

    /// Drop a flow without finishing it
    pub fn async_abort(&self, flow_id: &str) -> FlowStepResult<()> {
        if self.flows.remove(flow_id).is_none() {
            return Err(FlowError::UnknownFlow(flow_id.to_string()));
        }
        debug!("Aborted flow {}", flow_id);
        Ok(())
    }

    /// Flows currently waiting for input
    pub fn async_progress(&self) -> Vec<FlowProgress> {
        self.flows.iter().map(|r| r.value().0.clone()).collect()
    }

    /// Run one step and finish the flow if it produced an entry
    async fn run_step(
        &self,
        flow_id: &str,
        active: &mut ActiveFlow,
        step: FlowStep,
        input: Option<serde_json::Value>,
    ) -> FlowStepResult {
        let result = active.flow.async_step(step, input).await?;

        let result = match result.result_type {
            FlowResultType::CreateEntry => self.finish_flow(active.flow.as_ref(), result).await?,
            FlowResultType::Abort => {
                debug!(
                    "Flow {} aborted: {}",
                    flow_id,
                    result.reason.as_deref().unwrap_or("unknown")
                );
                result
            }
            FlowResultType::Form => result,
        };

        Ok(result.with_flow_id(flow_id))
    }

    /// Keep a flow that is waiting for input after its first step
    fn store_flow(
        &self,
        flow_id: &str,
        domain: &str,
        source: ConfigEntrySource,
        result: &FlowResult,
        mut active: ActiveFlow,
    ) -> FlowStepResult<()> {
        if let Some(step_id) = &result.step_id {
            active.step = step_id.parse()?;
        }

        let progress = FlowProgress {
            flow_id: flow_id.to_string(),
            handler: domain.to_string(),
            step_id: active.step.to_string(),
            source,
        };
        self.flows
            .insert(flow_id.to_string(), (progress, Arc::new(Mutex::new(active))));
        Ok(())
    }

    /// Create the config entry for a `create_entry` result
    ///
    /// Losing a race for the unique_id turns the result into an abort.
    async fn finish_flow(&self, flow: &dyn ConfigFlow, result: FlowResult) -> FlowStepResult {
        let context = flow.context();
        let title = result.title.clone().unwrap_or_default();

        let mut entry = ConfigEntry::new(&result.handler, &title)
            .with_data(result.data.clone().unwrap_or_default())
            .with_source(context.source)
            .with_version(result.version.unwrap_or(1), 1);
        if let Some(unique_id) = &context.unique_id {
            entry = entry.with_unique_id(unique_id);
        }

        match self.entries.add(entry).await {
            Ok(entry) => {
                info!("Config flow created entry {} for {}", entry.title, entry.domain);
                Ok(FlowResult {
                    entry_id: Some(entry.entry_id),
                    ..result
                })
            }
            Err(ConfigEntriesError::AlreadyExists { domain, unique_id }) => {
                warn!(
                    "Entry for {} with unique_id {} was created while the flow ran",
                    domain, unique_id
                );
                Ok(FlowResult::abort(&domain, ABORT_ALREADY_CONFIGURED))
            }
            Err(e) => Err(e.into()),
        }
    }
}
