//! Config flow for Aquacell

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ha_config_entries::{
    base_error, validate_with, ConfigData, ConfigFlow, DataSchema, FieldType, FlowContext,
    FormField, FormStep, StepResult,
};
use ha_core::ErrorKind;
use serde_json::{json, Value};
use tracing::warn;

use super::api::{AquacellConnector, AquacellError};
use super::AquacellConfig;

const STEP_USER: &str = "user";
const STEP_REAUTH_CONFIRM: &str = "reauth_confirm";

fn user_schema() -> DataSchema {
    DataSchema::new()
        .field(FormField::required("email", FieldType::Email))
        .field(FormField::required("password", FieldType::Password))
        .field(
            FormField::optional("brand", FieldType::Select)
                .with_options(["aquacell", "harvey"])
                .with_default("aquacell"),
        )
}

fn reauth_schema() -> DataSchema {
    DataSchema::new().field(FormField::required("password", FieldType::Password))
}

fn parse(data: &ConfigData) -> Result<AquacellConfig, ErrorKind> {
    serde_json::from_value(Value::Object(data.clone())).map_err(|e| {
        warn!("Unusable Aquacell config: {}", e);
        ErrorKind::Unknown
    })
}

pub struct AquacellConfigFlow {
    connector: Arc<dyn AquacellConnector>,
}

impl AquacellConfigFlow {
    pub fn new(connector: Arc<dyn AquacellConnector>) -> Self {
        Self { connector }
    }

    /// Log in once, returning a fresh refresh token
    async fn login(&self, config: &AquacellConfig) -> Result<String, AquacellError> {
        let mut api = self.connector.connect(config.brand);
        api.authenticate(&config.email, &config.password).await
    }

    async fn login_with(&self, data: &ConfigData, ctx: &FlowContext) -> Result<String, ErrorKind> {
        let config = parse(data)?;
        validate_with(&ctx.context, self.login(&config)).await
    }

    async fn step_user(&self, input: ConfigData, ctx: &FlowContext) -> StepResult {
        match self.login_with(&input, ctx).await {
            Ok(refresh_token) => {
                let email = input
                    .get("email")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let mut data = input;
                store_token(&mut data, refresh_token);
                StepResult::CreateEntry {
                    title: email.clone(),
                    unique_id: Some(email.to_lowercase()),
                    data,
                }
            }
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
        if let Some(password) = input.get("password") {
            data.insert("password".to_string(), password.clone());
        }

        match self.login_with(&data, ctx).await {
            Ok(refresh_token) => {
                store_token(&mut data, refresh_token);
                StepResult::UpdateEntry {
                    entry_id: entry.entry_id.clone(),
                    data,
                }
            }
            Err(kind) => StepResult::form(reauth_form(&entry.title).with_errors(base_error(kind))),
        }
    }
}

fn store_token(data: &mut ConfigData, refresh_token: String) {
    data.insert("refresh_token".to_string(), json!(refresh_token));
    data.insert(
        "refresh_token_creation_time".to_string(),
        json!(Utc::now().timestamp()),
    );
}

fn reauth_form(email: &str) -> FormStep {
    FormStep::new(STEP_REAUTH_CONFIRM, reauth_schema()).with_placeholder("email", email)
}

#[async_trait]
impl ConfigFlow for AquacellConfigFlow {
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
