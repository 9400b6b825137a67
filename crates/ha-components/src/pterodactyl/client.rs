//! Pterodactyl client API over HTTP
//!
//! Base path: `/api/client`
//! Auth: `Authorization: Bearer <api key>`

use std::time::Duration;

use ha_core::{Classify, ErrorKind};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PterodactylError {
    #[error("invalid panel URL: {0}")]
    InvalidUrl(String),

    #[error("cannot reach the panel: {0}")]
    Connection(String),

    #[error("API key rejected ({0})")]
    Authorization(StatusCode),

    #[error("panel returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    InvalidResponse(String),
}

impl Classify for PterodactylError {
    fn kind(&self) -> ErrorKind {
        match self {
            PterodactylError::Connection(_) => ErrorKind::CannotConnect,
            PterodactylError::Authorization(_) => ErrorKind::CannotAuthenticate,
            PterodactylError::Api { .. } | PterodactylError::InvalidResponse(_) => {
                ErrorKind::CannotRetrieveData
            }
            PterodactylError::InvalidUrl(_) => ErrorKind::Unknown,
        }
    }
}

impl From<url::ParseError> for PterodactylError {
    fn from(err: url::ParseError) -> Self {
        PterodactylError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for PterodactylError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PterodactylError::InvalidResponse(err.to_string())
        } else {
            PterodactylError::Connection(err.to_string())
        }
    }
}

/// Parse a panel URL and make its path a directory, so `api/...` joins
/// below it
pub fn normalize_url(raw: &str) -> Result<Url, PterodactylError> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(PterodactylError::InvalidUrl(raw.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    attributes: T,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<Envelope<T>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    detail: Option<String>,
}

/// Resource limits of a server; zero means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ServerLimits {
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default)]
    pub cpu: u64,
}

/// Server as listed by `GET /api/client`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSummary {
    pub identifier: String,
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub limits: ServerLimits,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub memory_bytes: u64,
    #[serde(default)]
    pub cpu_absolute: f64,
    #[serde(default)]
    pub disk_bytes: u64,
    #[serde(default)]
    pub network_rx_bytes: u64,
    #[serde(default)]
    pub network_tx_bytes: u64,
    /// Milliseconds since the server started
    #[serde(default)]
    pub uptime: u64,
}

/// `GET /api/client/servers/{identifier}/resources`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerResources {
    pub current_state: String,
    #[serde(default)]
    pub is_suspended: bool,
    pub resources: ResourceUsage,
}

/// Async client for the panel's client API
#[derive(Debug, Clone)]
pub struct PterodactylClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl PterodactylClient {
    pub fn new(url: &str, api_key: &str) -> Result<Self, PterodactylError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PterodactylError::Connection(e.to_string()))?;
        Ok(Self::with_client(http, normalize_url(url)?, api_key))
    }

    /// Wrap an existing `reqwest::Client`
    pub fn with_client(http: reqwest::Client, base_url: Url, api_key: &str) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PterodactylError> {
        let url = self.base_url.join(path)?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PterodactylError::Authorization(status));
        }

        let body = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.errors.into_iter().find_map(|d| d.detail))
                .unwrap_or_else(|| status.to_string());
            return Err(PterodactylError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PterodactylError::InvalidResponse(e.to_string()))
    }

    /// Servers the API key has access to
    pub async fn list_servers(&self) -> Result<Vec<ServerSummary>, PterodactylError> {
        let list: ListResponse<ServerSummary> = self.get("api/client").await?;
        Ok(list.data.into_iter().map(|s| s.attributes).collect())
    }

    pub async fn server_resources(
        &self,
        identifier: &str,
    ) -> Result<ServerResources, PterodactylError> {
        let stats: Envelope<ServerResources> = self
            .get(&format!("api/client/servers/{identifier}/resources"))
            .await?;
        Ok(stats.attributes)
    }
}
