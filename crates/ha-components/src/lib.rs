//! Polled integrations
//!
//! Each integration pairs a config flow with a coordinator-driven sensor
//! platform. Vendor protocols for Comelit and Aquacell are supplied by the
//! host through connector traits; Pterodactyl talks HTTP directly.

pub mod aquacell;
pub mod comelit;
mod config;
pub mod pterodactyl;
mod sensor;

use std::sync::Arc;

use ha_config_entries::ConfigEntries;

pub use config::{CoordinatorOverrides, IntegrationsConfig, IntegrationsConfigError};
pub use sensor::{
    SensorDescription, SensorEntity, SensorPlatform, SensorState, STATE_UNKNOWN,
};

/// Register every integration with the config entries manager
pub fn register_integrations(
    entries: &ConfigEntries,
    config: &IntegrationsConfig,
    comelit: Arc<dyn comelit::ComelitConnector>,
    aquacell: Arc<dyn aquacell::AquacellConnector>,
) {
    entries.register_integration(Arc::new(comelit::ComelitIntegration::new(
        comelit,
        config.coordinator(comelit::DOMAIN, comelit::UPDATE_INTERVAL),
    )));
    entries.register_integration(Arc::new(aquacell::AquacellIntegration::new(
        aquacell,
        config.coordinator(aquacell::DOMAIN, aquacell::UPDATE_INTERVAL),
    )));
    entries.register_integration(Arc::new(pterodactyl::PterodactylIntegration::new(
        config.coordinator(pterodactyl::DOMAIN, pterodactyl::UPDATE_INTERVAL),
    )));
}
