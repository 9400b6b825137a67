//! Coordinator configuration

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// What an authentication failure does to the published snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReauthPolicy {
    /// Listeners keep seeing the last good records while marked unavailable
    #[default]
    KeepLastSnapshot,
    /// Publish an empty snapshot
    ClearSnapshot,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorConfigError {
    #[error("update_interval must be greater than zero")]
    ZeroInterval,
}

/// Polling behaviour of one coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Time between refreshes, in seconds when serialized
    #[serde(
        serialize_with = "serialize_secs",
        deserialize_with = "deserialize_secs"
    )]
    pub update_interval: Duration,

    pub reauth_policy: ReauthPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

impl CoordinatorConfig {
    pub fn new(update_interval: Duration) -> Self {
        Self {
            update_interval,
            reauth_policy: ReauthPolicy::default(),
        }
    }

    pub fn with_reauth_policy(mut self, policy: ReauthPolicy) -> Self {
        self.reauth_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), CoordinatorConfigError> {
        if self.update_interval.is_zero() {
            return Err(CoordinatorConfigError::ZeroInterval);
        }
        Ok(())
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

fn deserialize_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.update_interval, Duration::from_secs(60));
        assert_eq!(config.reauth_policy, ReauthPolicy::KeepLastSnapshot);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_seconds() {
        let config: CoordinatorConfig =
            serde_yaml::from_str("update_interval: 5\nreauth_policy: clear_snapshot\n").unwrap();
        assert_eq!(config.update_interval, Duration::from_secs(5));
        assert_eq!(config.reauth_policy, ReauthPolicy::ClearSnapshot);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["update_interval"], 5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CoordinatorConfig = serde_yaml::from_str("reauth_policy: clear_snapshot").unwrap();
        assert_eq!(config.update_interval, DEFAULT_UPDATE_INTERVAL);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = CoordinatorConfig::new(Duration::ZERO);
        assert_eq!(config.validate(), Err(CoordinatorConfigError::ZeroInterval));
    }
}
