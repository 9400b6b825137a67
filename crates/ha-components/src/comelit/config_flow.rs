//! Config flow for Comelit

use std::sync::Arc;

use async_trait::async_trait;
use ha_config_entries::{
    base_error, validate_with, ConfigData, ConfigFlow, DataSchema, FieldType, FlowContext,
    FormField, FormStep, StepResult,
};
use ha_core::ErrorKind;
use serde_json::Value;
use tracing::warn;

use super::api::{ComelitConnector, ComelitError};
use super::{ComelitConfig, DeviceType, DEFAULT_PIN, DEFAULT_PORT};

const STEP_USER: &str = "user";
const STEP_REAUTH_CONFIRM: &str = "reauth_confirm";

fn user_schema() -> DataSchema {
    DataSchema::new()
        .field(FormField::required("host", FieldType::String))
        .field(FormField::optional("port", FieldType::Integer).with_default(DEFAULT_PORT))
        .field(FormField::optional("pin", FieldType::Integer).with_default(DEFAULT_PIN))
        .field(
            FormField::optional("type", FieldType::Select)
                .with_options(["bridge", "vedo"])
                .with_default("bridge"),
        )
}

fn reauth_schema() -> DataSchema {
    DataSchema::new().field(FormField::required("pin", FieldType::Integer))
}

/// Log in once with the submitted config, then release the session
async fn validate_input(
    connector: &dyn ComelitConnector,
    config: &ComelitConfig,
) -> Result<(), ComelitError> {
    match config.device_type {
        DeviceType::Bridge => {
            let mut api = connector.serial_bridge(config);
            api.login().await?;
            api.logout().await
        }
        DeviceType::Vedo => {
            let mut api = connector.vedo(config);
            api.login().await?;
            api.logout().await
        }
    }
}

fn parse(data: &ConfigData) -> Result<ComelitConfig, ErrorKind> {
    serde_json::from_value(Value::Object(data.clone())).map_err(|e| {
        warn!("Unusable Comelit config: {}", e);
        ErrorKind::Unknown
    })
}

pub struct ComelitConfigFlow {
    connector: Arc<dyn ComelitConnector>,
}

impl ComelitConfigFlow {
    pub fn new(connector: Arc<dyn ComelitConnector>) -> Self {
        Self { connector }
    }

    async fn step_user(&self, input: ConfigData, ctx: &FlowContext) -> StepResult {
        let result = match parse(&input) {
            Ok(config) => validate_with(&ctx.context, validate_input(&*self.connector, &config))
                .await
                .map(|()| config),
            Err(kind) => Err(kind),
        };

        match result {
            Ok(config) => StepResult::CreateEntry {
                title: config.host.clone(),
                unique_id: Some(config.host),
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
        if let Some(pin) = input.get("pin") {
            data.insert("pin".to_string(), pin.clone());
        }

        let result = match parse(&data) {
            Ok(config) => {
                validate_with(&ctx.context, validate_input(&*self.connector, &config)).await
            }
            Err(kind) => Err(kind),
        };

        match result {
            Ok(()) => StepResult::UpdateEntry {
                entry_id: entry.entry_id.clone(),
                data,
            },
            Err(kind) => StepResult::form(reauth_form(&data).with_errors(base_error(kind))),
        }
    }
}

fn reauth_form(data: &ConfigData) -> FormStep {
    let host = data.get("host").and_then(Value::as_str).unwrap_or_default();
    FormStep::new(STEP_REAUTH_CONFIRM, reauth_schema()).with_placeholder("host", host)
}

#[async_trait]
impl ConfigFlow for ComelitConfigFlow {
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
                Some(entry) => StepResult::form(reauth_form(&entry.data)),
                None => StepResult::abort("unknown_entry"),
            },
            (STEP_REAUTH_CONFIRM, Some(input)) => self.step_reauth_confirm(input, ctx).await,
            _ => StepResult::abort("not_supported"),
        }
    }
}
