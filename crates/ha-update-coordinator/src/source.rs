//! Device-family strategy plugged into the generic coordinator

use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use async_trait::async_trait;
use ha_core::Classify;
use ha_registries::DeviceInfo;

use crate::snapshot::Snapshot;

/// One device family's way of talking to its remote
///
/// The coordinator calls `authenticate` then `fetch` on every refresh, with
/// exclusive access to the source; at most one cycle runs at a time.
#[async_trait]
pub trait UpdateSource: Send + 'static {
    type Key: Ord + Clone + Debug + Send + Sync + 'static;
    type Value: Send + Sync + 'static;
    type Error: Classify + Display + Send + Sync + 'static;

    /// Establish or renew the remote session
    async fn authenticate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Fetch every record; the result replaces the previous snapshot
    async fn fetch(&mut self) -> Result<BTreeMap<Self::Key, Self::Value>, Self::Error>;

    /// Release the remote session when the entry is unloaded
    async fn close(&mut self) {}

    /// Hub device registered when the entry is set up
    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }

    /// Devices behind the hub, one per record where the family has them
    fn child_devices(&self, _snapshot: &Snapshot<Self::Key, Self::Value>) -> Vec<DeviceInfo> {
        Vec::new()
    }
}
