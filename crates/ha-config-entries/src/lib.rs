//! Config Entries
//!
//! This crate provides the configuration entry system for Home Assistant.
//! Config entries represent individual integration instances; config flows
//! are the wizards that create them.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntries`] - Registry of all config entries
//! - [`ConfigFlow`] - Trait implemented by an integration's setup wizard
//! - [`FlowManager`] - Runs config flows and stores their results
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking for migrations.

pub mod entry;
pub mod flow;
pub mod flow_manager;
pub mod manager;

// Re-export main types
pub use entry::{ConfigEntry, ConfigEntrySource};

pub use flow::{
    parse_step_input, ConfigFlow, FlowContext, FlowError, FlowResult, FlowResultType, FlowStep,
    FlowStepResult, FormField, ABORT_ALREADY_CONFIGURED,
};

pub use flow_manager::{FlowFactory, FlowManager, FlowProgress};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, STORAGE_KEY,
    STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
