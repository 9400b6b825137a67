use ha_update_coordinator::{CoordinatorEntity, DataUpdateCoordinator};
use serde_json::{json, Value};

use super::api::{BridgeDeviceKind, BridgeObject};
use super::coordinator::{object_identifier, AlarmKey, AlarmRecord, SerialBridgeSource, VedoSource};
use crate::sensor::{SensorDescription, SensorEntity};

static POWER: SensorDescription<BridgeObject> = SensorDescription {
    key: "power",
    name: "Power",
    unit: Some("W"),
    value_fn: power,
};

static ZONE_STATUS: SensorDescription<AlarmRecord> = SensorDescription {
    key: "human_status",
    name: "Status",
    unit: None,
    value_fn: zone_status,
};

fn power(object: &BridgeObject) -> Option<Value> {
    Some(json!(object.power))
}

fn zone_status(record: &AlarmRecord) -> Option<Value> {
    match record {
        AlarmRecord::Zone(zone) => Some(json!(zone.human_status.as_str())),
        AlarmRecord::Area(_) => None,
    }
}

/// Power sensors for the appliances behind a serial bridge
pub(super) fn bridge_sensors(
    entry_id: &str,
    coordinator: &DataUpdateCoordinator<SerialBridgeSource>,
) -> Vec<SensorEntity<(BridgeDeviceKind, u32), BridgeObject>> {
    coordinator
        .data()
        .iter()
        .filter(|((kind, _), _)| *kind == BridgeDeviceKind::Other)
        .map(|(key, object)| {
            let (kind, index) = *key;
            SensorEntity::new(
                format!("{}-{}", entry_id, index),
                &object.name,
                CoordinatorEntity::new(coordinator, *key),
                &POWER,
            )
            .with_device(object_identifier(entry_id, kind.as_str(), index))
        })
        .collect()
}

/// Status sensors for VEDO alarm zones
pub(super) fn zone_sensors(
    entry_id: &str,
    coordinator: &DataUpdateCoordinator<VedoSource>,
) -> Vec<SensorEntity<AlarmKey, AlarmRecord>> {
    coordinator
        .data()
        .iter()
        .filter_map(|(key, record)| match *key {
            AlarmKey::Zone(index) => Some(
                SensorEntity::new(
                    format!("{}-{}", entry_id, index),
                    record.name(),
                    CoordinatorEntity::new(coordinator, *key),
                    &ZONE_STATUS,
                )
                .with_device(object_identifier(entry_id, "zone", index)),
            ),
            AlarmKey::Area(_) => None,
        })
        .collect()
}
