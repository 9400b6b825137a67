//! Config flows
//!
//! A config flow is a short-lived, step-based validator. Each step either
//! shows a form (the flow then suspends until the UI submits input),
//! creates an entry, replaces the data of an existing entry after
//! reauthentication, or aborts.
//!
//! ```text
//! init → form(attempt=1) → form(attempt=n+1, errors) | create_entry
//!                        ↘ abort (already_configured, reauth_successful, ...)
//! ```
//!
//! Validation results are never cached: every submission reaches the
//! handler, which performs one live call against the remote API.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ha_core::{Classify, Context, ErrorKind, ABORT_ALREADY_CONFIGURED, ABORT_REAUTH_SUCCESSFUL};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn, Instrument};

use crate::entry::{ConfigData, ConfigEntry, ConfigEntrySource};
use crate::manager::{ConfigEntries, ConfigEntriesError};
use crate::schema::{DataSchema, SchemaError};

/// Errors keyed by field name, `"base"` for form-wide errors
pub type FlowErrors = HashMap<String, String>;

/// Form-wide error for a classified failure
pub fn base_error(kind: ErrorKind) -> FlowErrors {
    HashMap::from([("base".to_string(), kind.as_str().to_string())])
}

/// Run the single validation call of a flow step and classify its outcome
///
/// The raw error is logged but only its [`ErrorKind`] is returned, so no
/// vendor message can reach the form.
pub async fn validate_with<T, E, F>(ctx: &Context, call: F) -> Result<T, ErrorKind>
where
    F: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    match call.instrument(ctx.span()).await {
        Ok(value) => Ok(value),
        Err(err) => {
            let kind = err.kind();
            if kind == ErrorKind::Unknown {
                error!("Unexpected exception during validation: {}", err);
            } else {
                warn!("Validation failed ({}): {}", kind, err);
            }
            Err(kind)
        }
    }
}

/// Result type of a flow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// A form to display
#[derive(Debug, Clone, PartialEq)]
pub struct FormStep {
    pub step_id: String,
    pub data_schema: DataSchema,
    pub errors: FlowErrors,
    pub description_placeholders: HashMap<String, String>,
}

impl FormStep {
    pub fn new(step_id: impl Into<String>, data_schema: DataSchema) -> Self {
        Self {
            step_id: step_id.into(),
            data_schema,
            errors: FlowErrors::new(),
            description_placeholders: HashMap::new(),
        }
    }

    pub fn with_errors(mut self, errors: FlowErrors) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.description_placeholders.insert(key.into(), value.into());
        self
    }
}

/// What a handler wants to happen after a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    ShowForm(FormStep),
    /// Persist a new entry; duplicates of `unique_id` abort the flow
    CreateEntry {
        title: String,
        data: ConfigData,
        unique_id: Option<String>,
    },
    /// Replace the data of an existing entry and reload it
    UpdateEntry { entry_id: String, data: ConfigData },
    Abort { reason: String },
}

impl StepResult {
    pub fn form(step: FormStep) -> Self {
        StepResult::ShowForm(step)
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        StepResult::Abort {
            reason: reason.into(),
        }
    }
}

/// Information a handler receives with every step
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub flow_id: String,
    pub source: ConfigEntrySource,
    /// Entry being reauthenticated or reconfigured
    pub entry: Option<ConfigEntry>,
    /// Logging context of this flow
    pub context: Context,
}

/// Step handler implemented by each integration
#[async_trait]
pub trait ConfigFlow: Send {
    async fn step(
        &mut self,
        step_id: &str,
        user_input: Option<ConfigData>,
        ctx: &FlowContext,
    ) -> StepResult;
}

/// Result returned to the UI after each step
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub data_schema: DataSchema,
    pub errors: FlowErrors,
    pub description_placeholders: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ConfigData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    /// How many times the current form has been shown
    pub attempt: u32,
}

impl FlowResult {
    fn base(flow_id: &str, handler: &str, result_type: FlowResultType) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            handler: handler.to_string(),
            result_type,
            step_id: None,
            data_schema: DataSchema::default(),
            errors: FlowErrors::new(),
            description_placeholders: HashMap::new(),
            title: None,
            reason: None,
            data: None,
            entry_id: None,
            attempt: 0,
        }
    }

    fn form(flow_id: &str, handler: &str, form: FormStep, attempt: u32) -> Self {
        Self {
            step_id: Some(form.step_id),
            data_schema: form.data_schema,
            errors: form.errors,
            description_placeholders: form.description_placeholders,
            attempt,
            ..Self::base(flow_id, handler, FlowResultType::Form)
        }
    }

    fn abort(flow_id: &str, handler: &str, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::base(flow_id, handler, FlowResultType::Abort)
        }
    }
}

/// Flow manager errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("No config flow handler for {0}")]
    UnknownHandler(String),

    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("Entry not found: {0}")]
    UnknownEntry(String),

    #[error("Invalid user input: {0}")]
    InvalidInput(#[from] SchemaError),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

pub type FlowManagerResult<T> = Result<T, FlowError>;

/// Summary of an in-progress flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowProgress {
    pub flow_id: String,
    pub handler: String,
    pub step_id: String,
    pub source: ConfigEntrySource,
}

struct ActiveFlow {
    handler: String,
    flow: Box<dyn ConfigFlow>,
    context: FlowContext,
    step_id: String,
    schema: DataSchema,
    attempt: u32,
}

/// A suspended flow plus the summary reported while its step runs
struct FlowSlot {
    progress: FlowProgress,
    flow: Arc<Mutex<ActiveFlow>>,
}

/// Runs config flows and turns their results into config entries
pub struct FlowManager {
    entries: Arc<ConfigEntries>,
    flows: DashMap<String, FlowSlot>,
}

impl FlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            flows: DashMap::new(),
        }
    }

    /// Start a flow for an integration
    ///
    /// `data` is passed to the initial step, as when a flow is started
    /// with pre-filled input instead of an empty form.
    pub async fn init(
        &self,
        domain: &str,
        source: ConfigEntrySource,
        data: Option<ConfigData>,
    ) -> FlowManagerResult<FlowResult> {
        self.start(domain, source, None, data).await
    }

    /// Start a reauthentication flow for an existing entry
    pub async fn init_reauth(&self, entry_id: &str) -> FlowManagerResult<FlowResult> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| FlowError::UnknownEntry(entry_id.to_string()))?;
        let domain = entry.domain.clone();
        self.start(&domain, ConfigEntrySource::Reauth, Some(entry), None)
            .await
    }

    async fn start(
        &self,
        domain: &str,
        source: ConfigEntrySource,
        entry: Option<ConfigEntry>,
        data: Option<ConfigData>,
    ) -> FlowManagerResult<FlowResult> {
        let integration = self
            .entries
            .integration(domain)
            .ok_or_else(|| FlowError::UnknownHandler(domain.to_string()))?;

        let flow_id = ulid::Ulid::new().to_string();
        let context = FlowContext {
            flow_id: flow_id.clone(),
            source,
            entry,
            context: Context::new(domain, format!("config_flow-{}", source.initial_step())),
        };
        let mut active = ActiveFlow {
            handler: domain.to_string(),
            flow: integration.create_flow(),
            context,
            step_id: source.initial_step().to_string(),
            schema: DataSchema::default(),
            attempt: 0,
        };
        info!("Started {} config flow {} ({:?})", domain, flow_id, source);

        let result = self.run_step(&mut active, data).await?;
        if result.result_type == FlowResultType::Form {
            let progress = FlowProgress {
                flow_id: flow_id.clone(),
                handler: active.handler.clone(),
                step_id: active.step_id.clone(),
                source,
            };
            self.flows.insert(
                flow_id,
                FlowSlot {
                    progress,
                    flow: Arc::new(Mutex::new(active)),
                },
            );
        }
        Ok(result)
    }

    /// Resume a suspended flow with submitted input
    pub async fn configure(
        &self,
        flow_id: &str,
        user_input: ConfigData,
    ) -> FlowManagerResult<FlowResult> {
        let active = self
            .flows
            .get(flow_id)
            .map(|r| r.flow.clone())
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let mut flow = active.lock_owned().await;
        if !self.flows.contains_key(flow_id) {
            return Err(FlowError::UnknownFlow(flow_id.to_string()));
        }
        flow.schema.validate(&user_input)?;
        let result = self.run_step(&mut flow, Some(user_input)).await?;
        if let Some(mut slot) = self.flows.get_mut(flow_id) {
            slot.progress.step_id = flow.step_id.clone();
        }
        Ok(result)
    }

    /// Cancel a flow
    pub fn abort(&self, flow_id: &str) -> FlowManagerResult<()> {
        self.flows
            .remove(flow_id)
            .map(|_| debug!("Aborted flow {}", flow_id))
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))
    }

    /// List active flows, including those with a step running
    pub fn progress(&self) -> Vec<FlowProgress> {
        self.flows.iter().map(|r| r.progress.clone()).collect()
    }

    async fn run_step(
        &self,
        flow: &mut ActiveFlow,
        user_input: Option<ConfigData>,
    ) -> FlowManagerResult<FlowResult> {
        let flow_id = flow.context.flow_id.clone();
        let handler = flow.handler.clone();
        let step_id = flow.step_id.clone();

        let result = flow
            .flow
            .step(&step_id, user_input, &flow.context)
            .instrument(flow.context.context.span())
            .await;

        match result {
            StepResult::ShowForm(form) => {
                flow.attempt = if form.step_id == step_id {
                    flow.attempt + 1
                } else {
                    1
                };
                flow.step_id = form.step_id.clone();
                flow.schema = form.data_schema.clone();
                debug!(
                    "Flow {} showing form {} (attempt {}, errors {:?})",
                    flow_id, form.step_id, flow.attempt, form.errors
                );
                Ok(FlowResult::form(&flow_id, &handler, form, flow.attempt))
            }
            StepResult::CreateEntry {
                title,
                data,
                unique_id,
            } => {
                self.flows.remove(&flow_id);
                self.create_entry(&flow_id, &handler, flow.context.source, title, data, unique_id)
                    .await
            }
            StepResult::UpdateEntry { entry_id, data } => {
                self.flows.remove(&flow_id);
                self.entries.replace_data(&entry_id, data).await?;
                if let Err(e) = self.entries.reload(&entry_id).await {
                    warn!("Reload after reauthentication of {} failed: {}", entry_id, e);
                }
                Ok(FlowResult::abort(&flow_id, &handler, ABORT_REAUTH_SUCCESSFUL))
            }
            StepResult::Abort { reason } => {
                self.flows.remove(&flow_id);
                info!("Flow {} aborted: {}", flow_id, reason);
                Ok(FlowResult::abort(&flow_id, &handler, reason))
            }
        }
    }

    async fn create_entry(
        &self,
        flow_id: &str,
        handler: &str,
        source: ConfigEntrySource,
        title: String,
        data: ConfigData,
        unique_id: Option<String>,
    ) -> FlowManagerResult<FlowResult> {
        if let Some(ref unique_id) = unique_id {
            if self.entries.get_by_unique_id(handler, unique_id).is_some() {
                info!("{} {} is already configured", handler, unique_id);
                return Ok(FlowResult::abort(flow_id, handler, ABORT_ALREADY_CONFIGURED));
            }
        }

        let mut entry = ConfigEntry::new(handler, title.clone())
            .with_data(data.clone())
            .with_source(source);
        if let Some(unique_id) = unique_id {
            entry = entry.with_unique_id(unique_id);
        }

        let entry = match self.entries.add(entry).await {
            Ok(entry) => entry,
            Err(ConfigEntriesError::AlreadyExists { .. }) => {
                return Ok(FlowResult::abort(flow_id, handler, ABORT_ALREADY_CONFIGURED));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.entries.setup(&entry.entry_id).await {
            warn!("Setup of new entry {} failed: {}", entry.entry_id, e);
        }

        Ok(FlowResult {
            title: Some(title),
            data: Some(data),
            entry_id: Some(entry.entry_id),
            ..FlowResult::base(flow_id, handler, FlowResultType::CreateEntry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{Integration, LoadedEntry, SetupContext, SetupError};
    use crate::schema::{FieldType, FormField};
    use ha_registries::Storage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    struct RemoteError {
        kind: ErrorKind,
        message: String,
    }

    impl Classify for RemoteError {
        fn kind(&self) -> ErrorKind {
            self.kind
        }
    }

    /// Scripted outcomes for successive validation calls
    #[derive(Default)]
    struct ScriptedRemote {
        failures: std::sync::Mutex<Vec<ErrorKind>>,
        calls: AtomicUsize,
        /// When set, each call waits for `release`
        hold: std::sync::atomic::AtomicBool,
        release: tokio::sync::Notify,
    }

    impl ScriptedRemote {
        async fn check(&self) -> Result<(), RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hold.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            match self.failures.lock().unwrap().pop() {
                Some(kind) => Err(RemoteError {
                    kind,
                    message: "socket closed by peer".to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    struct HostFlow(Arc<ScriptedRemote>);

    fn schema() -> DataSchema {
        DataSchema::new()
            .field(FormField::required("host", FieldType::String))
            .field(FormField::optional("pin", FieldType::Integer))
    }

    #[async_trait]
    impl ConfigFlow for HostFlow {
        async fn step(
            &mut self,
            step_id: &str,
            user_input: Option<ConfigData>,
            ctx: &FlowContext,
        ) -> StepResult {
            let Some(input) = user_input else {
                return match ctx.source {
                    ConfigEntrySource::Reauth => StepResult::form(FormStep::new(
                        "reauth_confirm",
                        DataSchema::new().field(FormField::required("pin", FieldType::Integer)),
                    )),
                    _ => StepResult::form(FormStep::new("user", schema())),
                };
            };
            match step_id {
                "user" => match validate_with(&ctx.context, self.0.check()).await {
                    Ok(()) => StepResult::CreateEntry {
                        title: input["host"].as_str().unwrap_or_default().to_string(),
                        unique_id: input["host"].as_str().map(str::to_string),
                        data: input,
                    },
                    Err(kind) => StepResult::form(
                        FormStep::new("user", schema().with_suggested_values(Some(&input)))
                            .with_errors(base_error(kind)),
                    ),
                },
                "reauth_confirm" => {
                    let entry = ctx.entry.as_ref().unwrap();
                    let mut data = entry.data.clone();
                    data.extend(input);
                    StepResult::UpdateEntry {
                        entry_id: entry.entry_id.clone(),
                        data,
                    }
                }
                _ => StepResult::abort("unknown_step"),
            }
        }
    }

    struct Loaded;

    #[async_trait]
    impl LoadedEntry for Loaded {
        async fn unload(&self) -> Result<(), String> {
            Ok(())
        }
    }

    struct HostIntegration(Arc<ScriptedRemote>);

    #[async_trait]
    impl Integration for HostIntegration {
        fn domain(&self) -> &str {
            "host"
        }

        fn create_flow(&self) -> Box<dyn ConfigFlow> {
            Box::new(HostFlow(self.0.clone()))
        }

        async fn setup_entry(
            &self,
            _entry: &ConfigEntry,
            _ctx: SetupContext,
        ) -> Result<Arc<dyn LoadedEntry>, SetupError> {
            Ok(Arc::new(Loaded))
        }
    }

    fn setup() -> (TempDir, Arc<ConfigEntries>, FlowManager, Arc<ScriptedRemote>) {
        let temp_dir = TempDir::new().unwrap();
        let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(temp_dir.path()))));
        let remote = Arc::new(ScriptedRemote::default());
        entries.register_integration(Arc::new(HostIntegration(remote.clone())));
        let manager = FlowManager::new(entries.clone());
        (temp_dir, entries, manager, remote)
    }

    fn input() -> ConfigData {
        json!({"host": "10.0.0.5", "pin": 1234})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_init_shows_empty_form() {
        let (_dir, _entries, manager, remote) = setup();

        let result = manager
            .init("host", ConfigEntrySource::User, None)
            .await
            .unwrap();

        assert_eq!(result.result_type, FlowResultType::Form);
        assert_eq!(result.step_id.as_deref(), Some("user"));
        assert!(result.errors.is_empty());
        assert_eq!(result.attempt, 1);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recovery_after_connect_error() {
        let (_dir, entries, manager, remote) = setup();
        remote
            .failures
            .lock()
            .unwrap()
            .push(ErrorKind::CannotConnect);

        let result = manager
            .init("host", ConfigEntrySource::User, None)
            .await
            .unwrap();
        let result = manager.configure(&result.flow_id, input()).await.unwrap();

        assert_eq!(result.result_type, FlowResultType::Form);
        assert_eq!(result.errors, base_error(ErrorKind::CannotConnect));
        assert_eq!(result.attempt, 2);
        assert_eq!(
            result.data_schema.get("host").unwrap().suggested_value,
            Some(json!("10.0.0.5"))
        );

        let result = manager.configure(&result.flow_id, input()).await.unwrap();

        assert_eq!(result.result_type, FlowResultType::CreateEntry);
        assert_eq!(result.title.as_deref(), Some("10.0.0.5"));
        assert_eq!(result.data, Some(input()));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);

        let entry = entries.get(result.entry_id.as_deref().unwrap()).unwrap();
        assert_eq!(entry.data, input());
        assert!(entry.is_loaded());
        assert!(manager.progress().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_error_hides_message() {
        let (_dir, _entries, manager, remote) = setup();
        remote.failures.lock().unwrap().push(ErrorKind::Unknown);

        let result = manager
            .init("host", ConfigEntrySource::User, None)
            .await
            .unwrap();
        let result = manager.configure(&result.flow_id, input()).await.unwrap();

        assert_eq!(result.errors, base_error(ErrorKind::Unknown));
        let rendered = serde_json::to_string(&result).unwrap();
        assert!(!rendered.contains("socket closed"));
    }

    #[tokio::test]
    async fn test_identical_failures_are_retried_live() {
        let (_dir, _entries, manager, remote) = setup();
        remote.failures.lock().unwrap().extend([
            ErrorKind::CannotConnect,
            ErrorKind::CannotConnect,
            ErrorKind::CannotConnect,
        ]);

        let result = manager
            .init("host", ConfigEntrySource::User, None)
            .await
            .unwrap();
        for _ in 0..3 {
            let result = manager.configure(&result.flow_id, input()).await.unwrap();
            assert_eq!(result.errors, base_error(ErrorKind::CannotConnect));
        }
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_already_configured() {
        let (_dir, entries, manager, _remote) = setup();
        entries
            .add(ConfigEntry::new("host", "10.0.0.5").with_unique_id("10.0.0.5"))
            .await
            .unwrap();

        let result = manager
            .init("host", ConfigEntrySource::User, Some(input()))
            .await
            .unwrap();

        assert_eq!(result.result_type, FlowResultType::Abort);
        assert_eq!(result.reason.as_deref(), Some(ABORT_ALREADY_CONFIGURED));
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_flow() {
        let (_dir, _entries, manager, remote) = setup();
        let result = manager
            .init("host", ConfigEntrySource::User, None)
            .await
            .unwrap();

        let bad = json!({"pin": 1}).as_object().cloned().unwrap();
        let err = manager.configure(&result.flow_id, bad).await.unwrap_err();

        assert!(matches!(
            err,
            FlowError::InvalidInput(SchemaError::MissingField(_))
        ));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.progress().len(), 1);
    }

    #[tokio::test]
    async fn test_reauth_replaces_data() {
        let (_dir, entries, manager, _remote) = setup();
        let entry = entries
            .add(
                ConfigEntry::new("host", "10.0.0.5")
                    .with_unique_id("10.0.0.5")
                    .with_data(input()),
            )
            .await
            .unwrap();

        let result = manager.init_reauth(&entry.entry_id).await.unwrap();
        assert_eq!(result.result_type, FlowResultType::Form);

        let pin = json!({"pin": 4321}).as_object().cloned().unwrap();
        let result = manager.configure(&result.flow_id, pin).await.unwrap();

        assert_eq!(result.result_type, FlowResultType::Abort);
        assert_eq!(result.reason.as_deref(), Some(ABORT_REAUTH_SUCCESSFUL));
        let stored = entries.get(&entry.entry_id).unwrap();
        assert_eq!(stored.data["pin"], json!(4321));
        assert_eq!(stored.data["host"], json!("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_unknown_flow_and_handler() {
        let (_dir, _entries, manager, _remote) = setup();

        assert!(matches!(
            manager.init("nope", ConfigEntrySource::User, None).await,
            Err(FlowError::UnknownHandler(_))
        ));
        assert!(matches!(
            manager.configure("missing", input()).await,
            Err(FlowError::UnknownFlow(_))
        ));

        let result = manager
            .init("host", ConfigEntrySource::User, None)
            .await
            .unwrap();
        manager.abort(&result.flow_id).unwrap();
        assert!(matches!(
            manager.configure(&result.flow_id, input()).await,
            Err(FlowError::UnknownFlow(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_progress_lists_flow_while_validating() {
        let (_dir, _entries, manager, remote) = setup();
        let manager = Arc::new(manager);
        let result = manager
            .init("host", ConfigEntrySource::User, None)
            .await
            .unwrap();
        remote.hold.store(true, Ordering::SeqCst);

        let submit = tokio::spawn({
            let manager = manager.clone();
            let flow_id = result.flow_id.clone();
            async move { manager.configure(&flow_id, input()).await }
        });
        while remote.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let progress = manager.progress();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].flow_id, result.flow_id);
        assert_eq!(progress[0].handler, "host");
        assert_eq!(progress[0].step_id, "user");

        remote.release.notify_one();
        let result = submit.await.unwrap().unwrap();
        assert_eq!(result.result_type, FlowResultType::CreateEntry);
        assert!(manager.progress().is_empty());
    }
}
