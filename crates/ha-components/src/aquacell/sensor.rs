use chrono::DateTime;
use ha_registries::DeviceIdentifier;
use ha_update_coordinator::{CoordinatorEntity, DataUpdateCoordinator};
use serde_json::{json, Value};

use super::api::Softener;
use super::coordinator::SoftenerSource;
use super::DOMAIN;
use crate::sensor::{SensorDescription, SensorEntity};

static SENSORS: [SensorDescription<Softener>; 7] = [
    SensorDescription {
        key: "salt_left_side_percentage",
        name: "Salt left side percentage",
        unit: Some("%"),
        value_fn: |s| Some(json!(s.salt.left_percent)),
    },
    SensorDescription {
        key: "salt_right_side_percentage",
        name: "Salt right side percentage",
        unit: Some("%"),
        value_fn: |s| Some(json!(s.salt.right_percent)),
    },
    SensorDescription {
        key: "salt_left_side_time_remaining",
        name: "Salt left side time remaining",
        unit: Some("d"),
        value_fn: |s| Some(json!(s.salt.left_days)),
    },
    SensorDescription {
        key: "salt_right_side_time_remaining",
        name: "Salt right side time remaining",
        unit: Some("d"),
        value_fn: |s| Some(json!(s.salt.right_days)),
    },
    SensorDescription {
        key: "battery",
        name: "Battery",
        unit: Some("%"),
        value_fn: |s| Some(json!(s.battery)),
    },
    SensorDescription {
        key: "wi_fi_strength",
        name: "Wi-Fi strength",
        unit: None,
        value_fn: |s| Some(json!(s.wifi_level.as_str())),
    },
    SensorDescription {
        key: "last_update",
        name: "Last update",
        unit: None,
        value_fn: last_update,
    },
];

fn last_update(softener: &Softener) -> Option<Value> {
    DateTime::from_timestamp(softener.last_update, 0).map(|ts| json!(ts.to_rfc3339()))
}

pub(super) fn softener_sensors(
    coordinator: &DataUpdateCoordinator<SoftenerSource>,
) -> Vec<SensorEntity<String, Softener>> {
    let snapshot = coordinator.data();
    let mut sensors = Vec::with_capacity(snapshot.len() * SENSORS.len());
    for dsn in snapshot.keys() {
        for description in &SENSORS {
            sensors.push(
                SensorEntity::new(
                    format!("{}-{}", dsn, description.key),
                    description.name,
                    CoordinatorEntity::new(coordinator, dsn.clone()),
                    description,
                )
                .with_device(DeviceIdentifier::new(DOMAIN, dsn)),
            );
        }
    }
    sensors
}
