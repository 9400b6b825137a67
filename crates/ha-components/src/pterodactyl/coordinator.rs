//! Pterodactyl update source

use std::collections::BTreeMap;

use async_trait::async_trait;
use ha_registries::{DeviceIdentifier, DeviceInfo};
use ha_update_coordinator::{Snapshot, UpdateSource};
use serde::Serialize;

use super::client::{PterodactylClient, PterodactylError};
use super::DOMAIN;

/// Combined listing and live resources of one game server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerData {
    pub name: String,
    pub uuid: String,
    pub identifier: String,
    pub node: String,
    pub state: String,
    pub cpu_utilization: f64,
    pub cpu_limit: u64,
    pub memory_usage: u64,
    /// Megabytes; zero means unlimited
    pub memory_limit: u64,
    pub disk_usage: u64,
    /// Megabytes; zero means unlimited
    pub disk_limit: u64,
    pub network_inbound: u64,
    pub network_outbound: u64,
    /// Milliseconds
    pub uptime: u64,
}

pub struct ServerSource {
    client: PterodactylClient,
}

impl ServerSource {
    pub fn new(client: PterodactylClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpdateSource for ServerSource {
    type Key = String;
    type Value = ServerData;
    type Error = PterodactylError;

    async fn fetch(&mut self) -> Result<BTreeMap<String, ServerData>, PterodactylError> {
        let mut data = BTreeMap::new();
        for server in self.client.list_servers().await? {
            let stats = self.client.server_resources(&server.identifier).await?;
            data.insert(
                server.uuid.clone(),
                ServerData {
                    name: server.name,
                    uuid: server.uuid,
                    identifier: server.identifier,
                    node: server.node,
                    state: stats.current_state,
                    cpu_utilization: stats.resources.cpu_absolute,
                    cpu_limit: server.limits.cpu,
                    memory_usage: stats.resources.memory_bytes,
                    memory_limit: server.limits.memory,
                    disk_usage: stats.resources.disk_bytes,
                    disk_limit: server.limits.disk,
                    network_inbound: stats.resources.network_rx_bytes,
                    network_outbound: stats.resources.network_tx_bytes,
                    uptime: stats.resources.uptime,
                },
            );
        }
        Ok(data)
    }

    fn child_devices(&self, snapshot: &Snapshot<String, ServerData>) -> Vec<DeviceInfo> {
        snapshot
            .iter()
            .map(|(uuid, server)| {
                DeviceInfo::new(DeviceIdentifier::new(DOMAIN, uuid))
                    .with_name(&server.name)
                    .with_manufacturer("Pterodactyl")
                    .with_model("Game server")
            })
            .collect()
    }
}
