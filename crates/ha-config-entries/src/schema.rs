//! Form schemas shown by config flow steps

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::entry::ConfigData;

/// Input type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Password,
    Integer,
    Url,
    Email,
    Select,
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Pre-filled value, e.g. what the user entered on a failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<Value>,
    /// Allowed values for `select` fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FormField {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
            suggested_value: None,
            options: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.field_type {
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Select => value
                .as_str()
                .is_some_and(|v| self.options.iter().any(|o| o == v)),
            _ => value.is_string(),
        }
    }
}

/// Submitted input rejected before reaching the flow step
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("required key not provided: {0}")]
    MissingField(String),

    #[error("invalid value for {0}")]
    InvalidValue(String),

    #[error("extra key not allowed: {0}")]
    ExtraField(String),
}

/// Ordered set of fields displayed by a form step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSchema {
    fields: Vec<FormField>,
}

impl DataSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Pre-fill fields with previously entered values
    pub fn with_suggested_values(mut self, input: Option<&ConfigData>) -> Self {
        let Some(input) = input else {
            return self;
        };
        for field in &mut self.fields {
            if let Some(value) = input.get(&field.name) {
                field.suggested_value = Some(value.clone());
            }
        }
        self
    }

    /// Check submitted input against the schema
    ///
    /// Input is not rewritten: optional fields keep their absence so the
    /// stored Connection Config matches what the user submitted.
    pub fn validate(&self, input: &ConfigData) -> Result<(), SchemaError> {
        for field in &self.fields {
            match input.get(&field.name) {
                Some(value) if !field.accepts(value) => {
                    return Err(SchemaError::InvalidValue(field.name.clone()))
                }
                Some(_) => {}
                None if field.required => {
                    return Err(SchemaError::MissingField(field.name.clone()))
                }
                None => {}
            }
        }
        if let Some(extra) = input.keys().find(|k| self.get(k).is_none()) {
            return Err(SchemaError::ExtraField(extra.clone()));
        }
        Ok(())
    }
}
