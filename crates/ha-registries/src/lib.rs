//! Registries backing integrations
//!
//! This crate provides JSON persistence in the `.storage/` directory
//! ([`Storage`]) and the device registry that integrations feed with
//! [`DeviceInfo`] metadata.

pub mod device_registry;
pub mod storage;

pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};

pub use device_registry::{
    DeviceEntry, DeviceIdentifier, DeviceInfo, DeviceRegistry, DeviceRegistryData,
};
