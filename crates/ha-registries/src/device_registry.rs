//! Device Registry
//!
//! Tracks the physical or logical devices exposed by integrations. A
//! coordinator describes its hub and child objects with [`DeviceInfo`];
//! the registry turns those into persistent [`DeviceEntry`] records indexed
//! by identifier and owning config entry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageResult};

/// Storage key for device registry
pub const STORAGE_KEY: &str = "core.device_registry";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// A device identifier (domain, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

/// Device metadata supplied by an integration for registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<DeviceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_device: Option<DeviceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    pub fn new(identifier: DeviceIdentifier) -> Self {
        Self {
            identifiers: vec![identifier],
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_hw_version(mut self, hw_version: impl Into<String>) -> Self {
        self.hw_version = Some(hw_version.into());
        self
    }

    pub fn with_sw_version(mut self, sw_version: impl Into<String>) -> Self {
        self.sw_version = Some(sw_version.into());
        self
    }

    pub fn via(mut self, parent: DeviceIdentifier) -> Self {
        self.via_device = Some(parent);
        self
    }
}

/// A registered device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Internal id (ULID)
    pub id: String,
    #[serde(default)]
    pub identifiers: Vec<DeviceIdentifier>,
    /// Config entries that registered this device
    #[serde(default)]
    pub config_entries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    /// Parent device id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_device_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn from_info(config_entry_id: &str, info: &DeviceInfo, via_device_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string(),
            identifiers: info.identifiers.clone(),
            config_entries: vec![config_entry_id.to_string()],
            name: info.name.clone(),
            manufacturer: info.manufacturer.clone(),
            model: info.model.clone(),
            hw_version: info.hw_version.clone(),
            sw_version: info.sw_version.clone(),
            via_device_id,
            created_at: now,
            modified_at: now,
        }
    }

    /// Merge newer metadata from an integration
    fn apply(&mut self, config_entry_id: &str, info: &DeviceInfo, via_device_id: Option<String>) {
        for identifier in &info.identifiers {
            if !self.identifiers.contains(identifier) {
                self.identifiers.push(identifier.clone());
            }
        }
        if !self.config_entries.iter().any(|id| id == config_entry_id) {
            self.config_entries.push(config_entry_id.to_string());
        }
        if info.name.is_some() {
            self.name = info.name.clone();
        }
        if info.manufacturer.is_some() {
            self.manufacturer = info.manufacturer.clone();
        }
        if info.model.is_some() {
            self.model = info.model.clone();
        }
        if info.hw_version.is_some() {
            self.hw_version = info.hw_version.clone();
        }
        if info.sw_version.is_some() {
            self.sw_version = info.sw_version.clone();
        }
        if via_device_id.is_some() {
            self.via_device_id = via_device_id;
        }
        self.modified_at = Utc::now();
    }
}

/// Device registry data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRegistryData {
    pub devices: Vec<DeviceEntry>,
}

impl Storable for DeviceRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Device registry indexed by id, identifier and config entry
pub struct DeviceRegistry {
    storage: Arc<Storage>,

    /// Primary index: device_id -> DeviceEntry
    by_id: DashMap<String, DeviceEntry>,

    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,

    /// Index: config_entry_id -> set of device_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,

    /// Keeps snapshot and write of the devices file in one step
    save_lock: Mutex<()>,
}

impl DeviceRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_id: DashMap::new(),
            by_identifier: DashMap::new(),
            by_config_entry_id: DashMap::new(),
            save_lock: Mutex::new(()),
        }
    }

    /// Load from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load::<DeviceRegistryData>().await? {
            info!("Loading {} devices from storage", data.devices.len());
            for entry in data.devices {
                self.index_entry(entry);
            }
        }
        Ok(())
    }

    /// Save to storage
    pub async fn save(&self) -> StorageResult<()> {
        let _lock = self.save_lock.lock().await;
        let mut devices: Vec<DeviceEntry> = self.by_id.iter().map(|r| r.value().clone()).collect();
        devices.sort_by_key(|d| d.created_at);
        let count = devices.len();
        self.storage.save(&DeviceRegistryData { devices }).await?;
        debug!("Saved {} devices to storage", count);
        Ok(())
    }

    fn index_entry(&self, entry: DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.insert(identifier.key(), entry.id.clone());
        }
        for config_entry_id in &entry.config_entries {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(entry.id.clone());
        }
        self.by_id.insert(entry.id.clone(), entry);
    }

    fn unindex_entry(&self, entry: &DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier.key());
        }
        for config_entry_id in &entry.config_entries {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.id);
            }
        }
        self.by_id.remove(&entry.id);
    }

    fn find_id(&self, identifiers: &[DeviceIdentifier]) -> Option<String> {
        identifiers
            .iter()
            .find_map(|i| self.by_identifier.get(&i.key()).map(|r| r.value().clone()))
    }

    /// Register a device or refresh the metadata of an existing one
    ///
    /// Devices are matched by any of their identifiers. A `via_device`
    /// that is not registered yet is ignored.
    pub fn get_or_create(&self, config_entry_id: &str, info: &DeviceInfo) -> DeviceEntry {
        let via_device_id = info
            .via_device
            .as_ref()
            .and_then(|parent| self.find_id(std::slice::from_ref(parent)));

        let entry = match self.find_id(&info.identifiers).and_then(|id| self.get(&id)) {
            Some(mut existing) => {
                self.unindex_entry(&existing);
                existing.apply(config_entry_id, info, via_device_id);
                debug!("Updated device {} ({:?})", existing.id, existing.name);
                existing
            }
            None => {
                let created = DeviceEntry::from_info(config_entry_id, info, via_device_id);
                info!("Registered device {} ({:?})", created.id, created.name);
                created
            }
        };

        self.index_entry(entry.clone());
        entry
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceEntry> {
        self.by_id.get(device_id).map(|r| r.value().clone())
    }

    pub fn get_by_identifier(&self, identifier: &DeviceIdentifier) -> Option<DeviceEntry> {
        self.by_identifier
            .get(&identifier.key())
            .and_then(|id| self.get(id.value()))
    }

    /// All devices registered by a config entry
    pub fn devices_for_entry(&self, config_entry_id: &str) -> Vec<DeviceEntry> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Detach a config entry from its devices
    ///
    /// Devices left without any config entry are removed. Returns the
    /// number of removed devices.
    pub fn remove_config_entry(&self, config_entry_id: &str) -> usize {
        let Some((_, ids)) = self.by_config_entry_id.remove(config_entry_id) else {
            return 0;
        };

        let mut removed = 0;
        for id in ids {
            let Some(mut entry) = self.get(&id) else {
                continue;
            };
            self.unindex_entry(&entry);
            entry.config_entries.retain(|e| e != config_entry_id);
            if entry.config_entries.is_empty() {
                removed += 1;
                debug!("Removed device {}", entry.id);
            } else {
                self.index_entry(entry);
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
