use ha_registries::DeviceIdentifier;
use ha_update_coordinator::{CoordinatorEntity, DataUpdateCoordinator};
use serde_json::{json, Value};

use super::coordinator::{ServerData, ServerSource};
use super::DOMAIN;
use crate::sensor::{SensorDescription, SensorEntity};

static SENSORS: [SensorDescription<ServerData>; 7] = [
    SensorDescription {
        key: "status",
        name: "Status",
        unit: None,
        value_fn: |s| Some(json!(s.state)),
    },
    SensorDescription {
        key: "cpu_utilization",
        name: "CPU utilization",
        unit: Some("%"),
        value_fn: |s| Some(json!(s.cpu_utilization)),
    },
    SensorDescription {
        key: "memory_usage",
        name: "Memory usage",
        unit: Some("B"),
        value_fn: |s| Some(json!(s.memory_usage)),
    },
    SensorDescription {
        key: "disk_usage",
        name: "Disk usage",
        unit: Some("B"),
        value_fn: |s| Some(json!(s.disk_usage)),
    },
    SensorDescription {
        key: "network_inbound",
        name: "Network inbound",
        unit: Some("B"),
        value_fn: |s| Some(json!(s.network_inbound)),
    },
    SensorDescription {
        key: "network_outbound",
        name: "Network outbound",
        unit: Some("B"),
        value_fn: |s| Some(json!(s.network_outbound)),
    },
    SensorDescription {
        key: "uptime",
        name: "Uptime",
        unit: Some("ms"),
        value_fn: uptime,
    },
];

// Stopped servers report zero uptime
fn uptime(server: &ServerData) -> Option<Value> {
    (server.uptime > 0).then(|| json!(server.uptime))
}

pub(super) fn server_sensors(
    coordinator: &DataUpdateCoordinator<ServerSource>,
) -> Vec<SensorEntity<String, ServerData>> {
    let snapshot = coordinator.data();
    let mut sensors = Vec::with_capacity(snapshot.len() * SENSORS.len());
    for uuid in snapshot.keys() {
        for description in &SENSORS {
            sensors.push(
                SensorEntity::new(
                    format!("{}_{}", uuid, description.key),
                    description.name,
                    CoordinatorEntity::new(coordinator, uuid.clone()),
                    description,
                )
                .with_device(DeviceIdentifier::new(DOMAIN, uuid)),
            );
        }
    }
    sensors
}
