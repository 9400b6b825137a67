//! Comelit SimpleHome
//!
//! Polls a Comelit serial bridge (lights, covers, irrigation, appliances)
//! or a VEDO alarm system (areas and zones) every 5 seconds.

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

pub use api::{
    AlarmArea, AlarmAreaState, AlarmZone, AlarmZoneState, AreasAndZones, BridgeDeviceKind,
    BridgeObject, ComelitConnector, ComelitError, ComelitSession, SerialBridgeApi, VedoApi,
};
pub use config_flow::ComelitConfigFlow;
pub use coordinator::{object_identifier, AlarmKey, AlarmRecord, SerialBridgeSource, VedoSource};

use crate::sensor::SensorPlatform;

pub const DOMAIN: &str = "comelit";
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_PIN: u32 = 111_111;
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(5);

pub(crate) const BRIDGE_MODEL: &str = "Serial bridge";
pub(crate) const VEDO_MODEL: &str = "Vedo system";

/// Device family behind the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Bridge,
    Vedo,
}

/// Connection Config of a Comelit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComelitConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_pin")]
    pub pin: u32,
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_pin() -> u32 {
    DEFAULT_PIN
}

pub struct ComelitIntegration {
    connector: Arc<dyn ComelitConnector>,
    coordinator: CoordinatorConfig,
}

impl ComelitIntegration {
    pub fn new(connector: Arc<dyn ComelitConnector>, coordinator: CoordinatorConfig) -> Self {
        Self {
            connector,
            coordinator,
        }
    }
}

#[async_trait]
impl Integration for ComelitIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn create_flow(&self) -> Box<dyn ConfigFlow> {
        Box::new(ComelitConfigFlow::new(self.connector.clone()))
    }

    async fn setup_entry(
        &self,
        entry: &ConfigEntry,
        ctx: SetupContext,
    ) -> Result<Arc<dyn LoadedEntry>, SetupError> {
        let config: ComelitConfig = entry
            .typed_data()
            .map_err(|e| SetupError::Failed(format!("invalid Comelit config: {e}")))?;
        let context = Context::new(DOMAIN, format!("{}-{}", DOMAIN, config.host));

        match config.device_type {
            DeviceType::Bridge => {
                let source = SerialBridgeSource::new(
                    self.connector.serial_bridge(&config),
                    &entry.entry_id,
                    &config.host,
                );
                let polling =
                    setup_polling(entry, ctx, context, source, self.coordinator.clone()).await?;
                let sensors = sensor::bridge_sensors(&entry.entry_id, polling.coordinator());
                Ok(Arc::new(SensorPlatform::new(polling, sensors)))
            }
            DeviceType::Vedo => {
                let source =
                    VedoSource::new(self.connector.vedo(&config), &entry.entry_id, &config.host);
                let polling =
                    setup_polling(entry, ctx, context, source, self.coordinator.clone()).await?;
                let sensors = sensor::zone_sensors(&entry.entry_id, polling.coordinator());
                Ok(Arc::new(SensorPlatform::new(polling, sensors)))
            }
        }
    }
}
