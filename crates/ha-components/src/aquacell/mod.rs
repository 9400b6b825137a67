//! AquaCell water softeners
//!
//! Cloud-polled salt levels of AquaCell and Harvey softeners, refreshed
//! once a day.

mod api;
mod config_flow;
mod coordinator;
mod sensor;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ha_config_entries::{
    ConfigEntry, ConfigFlow, Integration, LoadedEntry, SetupContext, SetupError,
};
use ha_core::Context;
use ha_update_coordinator::{setup_polling, CoordinatorConfig};
use serde::{Deserialize, Serialize};

pub use api::{AquacellApi, AquacellConnector, AquacellError, Salt, Softener, WifiLevel};
pub use config_flow::AquacellConfigFlow;
pub use coordinator::{SoftenerSource, REFRESH_TOKEN_EXPIRY_DAYS};

use crate::sensor::SensorPlatform;

pub const DOMAIN: &str = "aquacell";
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brand {
    #[default]
    Aquacell,
    Harvey,
}

impl Brand {
    pub fn manufacturer(&self) -> &'static str {
        match self {
            Brand::Aquacell => "AquaCell",
            Brand::Harvey => "Harvey",
        }
    }
}

/// Connection Config of an Aquacell entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AquacellConfig {
    pub email: String,
    pub password: String,
    /// Entries created before brands existed are AquaCell
    #[serde(default)]
    pub brand: Brand,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix seconds when `refresh_token` was issued
    #[serde(default)]
    pub refresh_token_creation_time: i64,
}

pub struct AquacellIntegration {
    connector: Arc<dyn AquacellConnector>,
    coordinator: CoordinatorConfig,
}

impl AquacellIntegration {
    pub fn new(connector: Arc<dyn AquacellConnector>, coordinator: CoordinatorConfig) -> Self {
        Self {
            connector,
            coordinator,
        }
    }
}

#[async_trait]
impl Integration for AquacellIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn create_flow(&self) -> Box<dyn ConfigFlow> {
        Box::new(AquacellConfigFlow::new(self.connector.clone()))
    }

    async fn setup_entry(
        &self,
        entry: &ConfigEntry,
        ctx: SetupContext,
    ) -> Result<Arc<dyn LoadedEntry>, SetupError> {
        let config: AquacellConfig = entry
            .typed_data()
            .map_err(|e| SetupError::Failed(format!("invalid Aquacell config: {e}")))?;
        let source = SoftenerSource::new(self.connector.connect(config.brand), &config);
        let context = Context::new(DOMAIN, &entry.title);

        let polling = setup_polling(entry, ctx, context, source, self.coordinator.clone()).await?;
        let sensors = sensor::softener_sensors(polling.coordinator());
        Ok(Arc::new(SensorPlatform::new(polling, sensors)))
    }
}
