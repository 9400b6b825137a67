//! Data Update Coordinator
//!
//! A coordinator owns one remote session and exposes a single `refresh`
//! entry point. Each successful refresh publishes a new immutable
//! [`Snapshot`] to every listener at once; a failed refresh leaves the
//! previous snapshot in place.
//!
//! # Key Types
//!
//! - [`UpdateSource`] - Device-family strategy: authenticate and fetch
//! - [`DataUpdateCoordinator`] - Serializes refreshes and publishes snapshots
//! - [`Poller`] - Periodic scheduler driving a coordinator
//! - [`CoordinatorEntity`] - Read-only view of one record
//! - [`PollingEntry`] - Loaded config entry backed by a coordinator

mod config;
mod coordinator;
mod entity;
mod error;
mod poller;
mod setup;
mod snapshot;
mod source;

pub use config::{CoordinatorConfig, CoordinatorConfigError, ReauthPolicy};
pub use coordinator::{CoordinatorStatus, DataUpdateCoordinator};
pub use entity::CoordinatorEntity;
pub use error::{UpdateError, UpdateResult};
pub use poller::{Poller, PollerStatus};
pub use setup::{setup_polling, PollingEntry};
pub use snapshot::Snapshot;
pub use source::UpdateSource;
