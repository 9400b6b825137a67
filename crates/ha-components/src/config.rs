//! Integration configuration from YAML
//!
//! ```yaml
//! comelit:
//!   update_interval: 10
//! aquacell:
//!   reauth_policy: clear_snapshot
//! ```
//!
//! Each key overrides the coordinator settings of one integration; missing
//! integrations and fields keep that integration's defaults.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use ha_update_coordinator::{CoordinatorConfig, CoordinatorConfigError, ReauthPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IntegrationsConfigError {
    #[error("Failed to read integration config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid integration config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config for {domain}: {source}")]
    Invalid {
        domain: String,
        #[source]
        source: CoordinatorConfigError,
    },
}

/// Coordinator overrides for one integration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorOverrides {
    /// Seconds between refreshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reauth_policy: Option<ReauthPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntegrationsConfig {
    domains: HashMap<String, CoordinatorOverrides>,
}

impl IntegrationsConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, IntegrationsConfigError> {
        // An empty file parses as null
        let config: Option<Self> = serde_yaml::from_str(yaml)?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IntegrationsConfigError> {
        let path = path.as_ref();
        debug!("Loading integration config from {}", path.display());
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    pub fn set(&mut self, domain: impl Into<String>, overrides: CoordinatorOverrides) {
        self.domains.insert(domain.into(), overrides);
    }

    /// Coordinator settings for `domain`, starting from its default interval
    pub fn coordinator(&self, domain: &str, default_interval: Duration) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::new(default_interval);
        if let Some(overrides) = self.domains.get(domain) {
            if let Some(secs) = overrides.update_interval {
                config.update_interval = Duration::from_secs(secs);
            }
            if let Some(policy) = overrides.reauth_policy {
                config.reauth_policy = policy;
            }
        }
        config
    }

    fn validate(&self) -> Result<(), IntegrationsConfigError> {
        for domain in self.domains.keys() {
            self.coordinator(domain, Duration::from_secs(1))
                .validate()
                .map_err(|source| IntegrationsConfigError::Invalid {
                    domain: domain.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}
