//! Pterodactyl game-server panel
//!
//! Lists the servers an API key can see and polls their live resources
//! once a minute.

mod client;
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

pub use client::{
    normalize_url, PterodactylClient, PterodactylError, ResourceUsage, ServerLimits,
    ServerResources, ServerSummary,
};
pub use config_flow::PterodactylConfigFlow;
pub use coordinator::{ServerData, ServerSource};

use crate::sensor::SensorPlatform;

pub const DOMAIN: &str = "pterodactyl";
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Connection Config of a Pterodactyl entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PterodactylConfig {
    pub url: String,
    pub api_key: String,
}

pub struct PterodactylIntegration {
    coordinator: CoordinatorConfig,
}

impl PterodactylIntegration {
    pub fn new(coordinator: CoordinatorConfig) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Integration for PterodactylIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn create_flow(&self) -> Box<dyn ConfigFlow> {
        Box::new(PterodactylConfigFlow::new())
    }

    async fn setup_entry(
        &self,
        entry: &ConfigEntry,
        ctx: SetupContext,
    ) -> Result<Arc<dyn LoadedEntry>, SetupError> {
        let config: PterodactylConfig = entry
            .typed_data()
            .map_err(|e| SetupError::Failed(format!("invalid Pterodactyl config: {e}")))?;
        let client = PterodactylClient::new(&config.url, &config.api_key)
            .map_err(|e| SetupError::Failed(e.to_string()))?;
        let context = Context::new(DOMAIN, &entry.title);

        let polling = setup_polling(
            entry,
            ctx,
            context,
            ServerSource::new(client),
            self.coordinator.clone(),
        )
        .await?;
        let sensors = sensor::server_sensors(polling.coordinator());
        Ok(Arc::new(SensorPlatform::new(polling, sensors)))
    }
}
