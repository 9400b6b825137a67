//! Config flow for Pterodactyl

use std::fmt;

use async_trait::async_trait;
use ha_config_entries::{
    base_error, validate_with, ConfigData, ConfigFlow, DataSchema, FieldType, FlowContext,
    FormField, FormStep, StepResult,
};
use ha_core::{Classify, ErrorKind};
use serde_json::Value;

use super::client::{PterodactylClient, PterodactylError};

const STEP_USER: &str = "user";
const STEP_REAUTH_CONFIRM: &str = "reauth_confirm";

fn user_schema() -> DataSchema {
    DataSchema::new()
        .field(FormField::required("url", FieldType::Url))
        .field(FormField::required("api_key", FieldType::Password))
}

fn reauth_schema() -> DataSchema {
    DataSchema::new().field(FormField::required("api_key", FieldType::Password))
}

/// A validation failure as shown on the form
///
/// Anything the panel or the network rejected is reported as
/// `cannot_connect`; only a response the client could not understand is
/// `unknown`.
struct ValidationError(PterodactylError);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Classify for ValidationError {
    fn kind(&self) -> ErrorKind {
        match self.0 {
            PterodactylError::InvalidResponse(_) => ErrorKind::Unknown,
            PterodactylError::InvalidUrl(_)
            | PterodactylError::Connection(_)
            | PterodactylError::Authorization(_)
            | PterodactylError::Api { .. } => ErrorKind::CannotConnect,
        }
    }
}

fn field<'a>(data: &'a ConfigData, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// List servers once, returning the normalized panel URL
async fn validate_input(url: &str, api_key: &str) -> Result<String, ValidationError> {
    let client = PterodactylClient::new(url, api_key).map_err(ValidationError)?;
    client.list_servers().await.map_err(ValidationError)?;
    Ok(client.base_url().to_string())
}

#[derive(Default)]
pub struct PterodactylConfigFlow;

impl PterodactylConfigFlow {
    pub fn new() -> Self {
        Self
    }

    async fn step_user(&self, input: ConfigData, ctx: &FlowContext) -> StepResult {
        let call = validate_input(field(&input, "url"), field(&input, "api_key"));
        match validate_with(&ctx.context, call).await {
            Ok(url) => StepResult::CreateEntry {
                title: url.clone(),
                unique_id: Some(url),
                data: input,
            },
            Err(kind) => StepResult::form(
                FormStep::new(STEP_USER, user_schema().with_suggested_values(Some(&input)))
                    .with_errors(base_error(kind)),
            ),
        }
    }

    async fn step_reauth_confirm(&self, input: ConfigData, ctx: &FlowContext) -> StepResult {
        let Some(entry) = ctx.entry.as_ref() else {
            return StepResult::abort("unknown_entry");
        };

        let mut data = entry.data.clone();
        if let Some(api_key) = input.get("api_key") {
            data.insert("api_key".to_string(), api_key.clone());
        }

        let call = validate_input(field(&data, "url"), field(&data, "api_key"));
        match validate_with(&ctx.context, call).await {
            Ok(_) => StepResult::UpdateEntry {
                entry_id: entry.entry_id.clone(),
                data,
            },
            Err(kind) => StepResult::form(reauth_form(&entry.title).with_errors(base_error(kind))),
        }
    }
}

fn reauth_form(url: &str) -> FormStep {
    FormStep::new(STEP_REAUTH_CONFIRM, reauth_schema()).with_placeholder("url", url)
}

#[async_trait]
impl ConfigFlow for PterodactylConfigFlow {
    async fn step(
        &mut self,
        step_id: &str,
        user_input: Option<ConfigData>,
        ctx: &FlowContext,
    ) -> StepResult {
        match (step_id, user_input) {
            (STEP_USER, None) => StepResult::form(FormStep::new(STEP_USER, user_schema())),
            (STEP_USER, Some(input)) => self.step_user(input, ctx).await,
            ("reauth", _) | (STEP_REAUTH_CONFIRM, None) => match ctx.entry.as_ref() {
                Some(entry) => StepResult::form(reauth_form(&entry.title)),
                None => StepResult::abort("unknown_entry"),
            },
            (STEP_REAUTH_CONFIRM, Some(input)) => self.step_reauth_confirm(input, ctx).await,
            _ => StepResult::abort("not_supported"),
        }
    }
}
