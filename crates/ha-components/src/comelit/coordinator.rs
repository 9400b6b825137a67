//! Comelit update sources
//!
//! Both families log in again at the start of every cycle.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ha_registries::{DeviceIdentifier, DeviceInfo};
use ha_update_coordinator::{Snapshot, UpdateSource};
use tracing::debug;

use super::api::{
    AlarmArea, AlarmZone, BridgeDeviceKind, BridgeObject, ComelitError, SerialBridgeApi, VedoApi,
};
use super::{BRIDGE_MODEL, DOMAIN, VEDO_MODEL};

const MANUFACTURER: &str = "Comelit";
const BRIDGE_HW_VERSION: &str = "20003101";
const VEDO_HW_VERSION: &str = "VEDO IP";

/// Device of one bridge object or alarm zone
pub fn object_identifier(entry_id: &str, object_type: &str, index: u32) -> DeviceIdentifier {
    DeviceIdentifier::new(DOMAIN, format!("{}-{}-{}", entry_id, object_type, index))
}

/// Hub registration and per-object device info
#[derive(Debug, Clone)]
struct Hub {
    entry_id: String,
    host: String,
    model: &'static str,
    hw_version: &'static str,
}

impl Hub {
    fn identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::new(DOMAIN, &self.entry_id)
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(self.identifier())
            .with_name(format!("{} ({})", self.model, self.host))
            .with_model(self.model)
            .with_manufacturer(MANUFACTURER)
            .with_hw_version(self.hw_version)
    }

    fn object_device_info(&self, object_type: &str, index: u32, name: &str) -> DeviceInfo {
        DeviceInfo::new(self.object_identifier(object_type, index))
            .via(self.identifier())
            .with_name(name)
            .with_model(format!("{} {}", self.model, object_type))
            .with_manufacturer(MANUFACTURER)
            .with_hw_version(self.hw_version)
    }

    fn object_identifier(&self, object_type: &str, index: u32) -> DeviceIdentifier {
        object_identifier(&self.entry_id, object_type, index)
    }
}

/// Serial bridge: lights, covers, irrigation and appliances
pub struct SerialBridgeSource {
    api: Box<dyn SerialBridgeApi>,
    hub: Hub,
}

impl SerialBridgeSource {
    pub fn new(api: Box<dyn SerialBridgeApi>, entry_id: &str, host: &str) -> Self {
        Self {
            api,
            hub: Hub {
                entry_id: entry_id.to_string(),
                host: host.to_string(),
                model: BRIDGE_MODEL,
                hw_version: BRIDGE_HW_VERSION,
            },
        }
    }
}

#[async_trait]
impl UpdateSource for SerialBridgeSource {
    type Key = (BridgeDeviceKind, u32);
    type Value = BridgeObject;
    type Error = ComelitError;

    async fn authenticate(&mut self) -> Result<(), ComelitError> {
        debug!("Polling Comelit {} host: {}", self.hub.model, self.hub.host);
        self.api.login().await
    }

    async fn fetch(&mut self) -> Result<BTreeMap<Self::Key, BridgeObject>, ComelitError> {
        let devices = self.api.get_all_devices().await?;
        Ok(devices
            .into_iter()
            .flat_map(|(kind, objects)| {
                objects
                    .into_iter()
                    .map(move |(index, object)| ((kind, index), object))
            })
            .collect())
    }

    async fn close(&mut self) {
        if let Err(e) = self.api.logout().await {
            debug!("Logout from {} failed: {}", self.hub.host, e);
        }
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(self.hub.device_info())
    }

    fn child_devices(&self, snapshot: &Snapshot<Self::Key, BridgeObject>) -> Vec<DeviceInfo> {
        snapshot
            .iter()
            .map(|((kind, index), object)| {
                self.hub
                    .object_device_info(kind.as_str(), *index, &object.name)
            })
            .collect()
    }
}

/// Key of a VEDO alarm record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlarmKey {
    Area(u32),
    Zone(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmRecord {
    Area(AlarmArea),
    Zone(AlarmZone),
}

impl AlarmRecord {
    pub fn name(&self) -> &str {
        match self {
            AlarmRecord::Area(area) => &area.name,
            AlarmRecord::Zone(zone) => &zone.name,
        }
    }
}

/// VEDO alarm: areas and zones
pub struct VedoSource {
    api: Box<dyn VedoApi>,
    hub: Hub,
}

impl VedoSource {
    pub fn new(api: Box<dyn VedoApi>, entry_id: &str, host: &str) -> Self {
        Self {
            api,
            hub: Hub {
                entry_id: entry_id.to_string(),
                host: host.to_string(),
                model: VEDO_MODEL,
                hw_version: VEDO_HW_VERSION,
            },
        }
    }
}

#[async_trait]
impl UpdateSource for VedoSource {
    type Key = AlarmKey;
    type Value = AlarmRecord;
    type Error = ComelitError;

    async fn authenticate(&mut self) -> Result<(), ComelitError> {
        debug!("Polling Comelit {} host: {}", self.hub.model, self.hub.host);
        self.api.login().await
    }

    async fn fetch(&mut self) -> Result<BTreeMap<AlarmKey, AlarmRecord>, ComelitError> {
        let data = self.api.get_all_areas_and_zones().await?;
        let areas = data
            .areas
            .into_iter()
            .map(|(index, area)| (AlarmKey::Area(index), AlarmRecord::Area(area)));
        let zones = data
            .zones
            .into_iter()
            .map(|(index, zone)| (AlarmKey::Zone(index), AlarmRecord::Zone(zone)));
        Ok(areas.chain(zones).collect())
    }

    async fn close(&mut self) {
        if let Err(e) = self.api.logout().await {
            debug!("Logout from {} failed: {}", self.hub.host, e);
        }
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(self.hub.device_info())
    }

    fn child_devices(&self, snapshot: &Snapshot<AlarmKey, AlarmRecord>) -> Vec<DeviceInfo> {
        snapshot
            .iter()
            .filter_map(|(key, record)| match key {
                AlarmKey::Zone(index) => {
                    Some(self.hub.object_device_info("zone", *index, record.name()))
                }
                AlarmKey::Area(_) => None,
            })
            .collect()
    }
}
