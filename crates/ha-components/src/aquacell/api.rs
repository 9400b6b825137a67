//! Aquacell cloud client boundary

use async_trait::async_trait;
use ha_core::{Classify, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Brand;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AquacellError {
    #[error("Aquacell API error: {0}")]
    Api(String),

    #[error("Timed out talking to the Aquacell API")]
    Timeout,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("{0}")]
    Other(String),
}

impl Classify for AquacellError {
    fn kind(&self) -> ErrorKind {
        match self {
            AquacellError::Api(_) | AquacellError::Timeout => ErrorKind::CannotConnect,
            AquacellError::AuthenticationFailed => ErrorKind::CannotAuthenticate,
            AquacellError::Other(_) => ErrorKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WifiLevel {
    High,
    Medium,
    Low,
}

impl WifiLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WifiLevel::High => "high",
            WifiLevel::Medium => "medium",
            WifiLevel::Low => "low",
        }
    }
}

/// Salt level of both tanks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt {
    pub left_percent: u8,
    pub right_percent: u8,
    pub left_days: u32,
    pub right_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Softener {
    /// Device serial number, stable across renames
    pub dsn: String,
    pub name: String,
    #[serde(default)]
    pub ssn: String,
    #[serde(default)]
    pub fw_version: String,
    pub salt: Salt,
    pub battery: u8,
    pub wifi_level: WifiLevel,
    /// Unix seconds of the softener's last report
    pub last_update: i64,
}

#[async_trait]
pub trait AquacellApi: Send + Sync {
    /// Log in with credentials, returning a refresh token
    async fn authenticate(&mut self, email: &str, password: &str) -> Result<String, AquacellError>;

    /// Open a session from a refresh token
    async fn authenticate_refresh(&mut self, refresh_token: &str) -> Result<(), AquacellError>;

    async fn get_all_softeners(&mut self) -> Result<Vec<Softener>, AquacellError>;
}

/// Creates clients for the cloud of one brand
pub trait AquacellConnector: Send + Sync {
    fn connect(&self, brand: Brand) -> Box<dyn AquacellApi>;
}
