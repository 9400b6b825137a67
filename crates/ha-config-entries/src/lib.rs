//! Config Entries
//!
//! Config entries represent individual integration instances: the
//! validated Connection Config a config flow produced, plus the lifecycle
//! (setup, unload, reload, reauthentication) of the running integration.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`FlowManager`] - Runs the step-based config flows that create entries
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking for migrations.

pub mod entry;
pub mod flow;
pub mod manager;
pub mod schema;
pub mod state_machine;

// Re-export main types
pub use entry::{
    ConfigData, ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState,
    ConfigEntryUpdate,
};

pub use flow::{
    base_error, validate_with, ConfigFlow, FlowContext, FlowError, FlowErrors, FlowManager,
    FlowManagerResult, FlowProgress, FlowResult, FlowResultType, FormStep, StepResult,
};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, Integration,
    LoadedEntry, ReauthRequest, ReauthTrigger, SetupContext, SetupError, STORAGE_KEY,
    STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use schema::{DataSchema, FieldType, FormField, SchemaError};
pub use state_machine::{retry_delay, InvalidTransition};
