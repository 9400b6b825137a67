//! Sensor platform shared by the integrations
//!
//! A sensor is a [`CoordinatorEntity`] plus a static description telling
//! it which value of the record to report.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ha_config_entries::LoadedEntry;
use ha_core::STATE_UNAVAILABLE;
use ha_registries::DeviceIdentifier;
use ha_update_coordinator::{CoordinatorEntity, PollingEntry, UpdateSource};
use serde_json::Value;

/// State reported when the record exists but has no value
pub const STATE_UNKNOWN: &str = "unknown";

/// What a sensor reads from its record
pub struct SensorDescription<V> {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub value_fn: fn(&V) -> Option<Value>,
}

/// Reported sensor state
#[derive(Debug, Clone, PartialEq)]
pub enum SensorState {
    Unavailable,
    Unknown,
    Value(Value),
}

impl SensorState {
    pub fn to_value(&self) -> Value {
        match self {
            SensorState::Unavailable => Value::from(STATE_UNAVAILABLE),
            SensorState::Unknown => Value::from(STATE_UNKNOWN),
            SensorState::Value(value) => value.clone(),
        }
    }
}

pub struct SensorEntity<K, V: 'static> {
    unique_id: String,
    name: String,
    device: Option<DeviceIdentifier>,
    description: &'static SensorDescription<V>,
    entity: CoordinatorEntity<K, V>,
}

impl<K: Ord + Clone, V: 'static> SensorEntity<K, V> {
    pub fn new(
        unique_id: impl Into<String>,
        name: impl Into<String>,
        entity: CoordinatorEntity<K, V>,
        description: &'static SensorDescription<V>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            device: None,
            description,
            entity,
        }
    }

    pub fn with_device(mut self, device: DeviceIdentifier) -> Self {
        self.device = Some(device);
        self
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.description.unit
    }

    pub fn device(&self) -> Option<&DeviceIdentifier> {
        self.device.as_ref()
    }

    pub fn state(&self) -> SensorState {
        if !self.entity.available() {
            return SensorState::Unavailable;
        }
        match self.entity.with_record(self.description.value_fn).flatten() {
            Some(value) => SensorState::Value(value),
            None => SensorState::Unknown,
        }
    }
}

/// Loaded entry exposing the sensors built from its first snapshot
pub struct SensorPlatform<S: UpdateSource> {
    polling: Arc<PollingEntry<S>>,
    sensors: Vec<SensorEntity<S::Key, S::Value>>,
}

impl<S: UpdateSource> SensorPlatform<S> {
    pub fn new(polling: Arc<PollingEntry<S>>, sensors: Vec<SensorEntity<S::Key, S::Value>>) -> Self {
        Self { polling, sensors }
    }

    pub fn polling(&self) -> &Arc<PollingEntry<S>> {
        &self.polling
    }

    pub fn sensors(&self) -> &[SensorEntity<S::Key, S::Value>] {
        &self.sensors
    }
}

#[async_trait]
impl<S: UpdateSource> LoadedEntry for SensorPlatform<S> {
    async fn unload(&self) -> Result<(), String> {
        self.polling.unload().await
    }

    fn states(&self) -> BTreeMap<String, Value> {
        self.sensors
            .iter()
            .map(|sensor| (sensor.unique_id.clone(), sensor.state().to_value()))
            .collect()
    }
}
