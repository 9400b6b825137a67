//! Comelit client boundary
//!
//! The wire protocol lives in an external client library. These traits are
//! the subset of it the integration uses; hosts plug in the real clients
//! through a [`ComelitConnector`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use ha_core::{Classify, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ComelitConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComelitError {
    #[error("Cannot connect: {0}")]
    CannotConnect(String),

    #[error("Cannot authenticate: {0}")]
    CannotAuthenticate(String),

    #[error("Cannot retrieve data: {0}")]
    CannotRetrieveData(String),

    #[error("{0}")]
    Other(String),
}

impl Classify for ComelitError {
    fn kind(&self) -> ErrorKind {
        match self {
            ComelitError::CannotConnect(_) => ErrorKind::CannotConnect,
            ComelitError::CannotAuthenticate(_) => ErrorKind::CannotAuthenticate,
            ComelitError::CannotRetrieveData(_) => ErrorKind::CannotRetrieveData,
            ComelitError::Other(_) => ErrorKind::Unknown,
        }
    }
}

/// Object classes exposed by the serial bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeDeviceKind {
    Cover,
    Light,
    Irrigation,
    Other,
    Scenario,
}

impl BridgeDeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeDeviceKind::Cover => "cover",
            BridgeDeviceKind::Light => "light",
            BridgeDeviceKind::Irrigation => "irrigation",
            BridgeDeviceKind::Other => "other",
            BridgeDeviceKind::Scenario => "scenario",
        }
    }
}

/// A light, cover, irrigation valve or appliance behind the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeObject {
    pub index: u32,
    pub name: String,
    pub status: i64,
    pub human_status: String,
    #[serde(rename = "type")]
    pub kind: BridgeDeviceKind,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub zone: String,
    /// Current draw of `other` objects
    #[serde(default)]
    pub power: f64,
    #[serde(default)]
    pub power_unit: String,
}

/// Armed state of an alarm area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAreaState {
    Disarmed,
    Armed,
    Entered,
    Triggered,
    Arming,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmArea {
    pub index: u32,
    pub name: String,
    pub p1: bool,
    pub p2: bool,
    pub ready: bool,
    pub armed: i64,
    pub alarm: bool,
    pub alarm_memory: bool,
    pub sabotage: bool,
    pub anomaly: bool,
    pub in_time: bool,
    pub out_time: bool,
    pub human_status: AlarmAreaState,
}

/// Sensor state of an alarm zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmZoneState {
    Rest,
    Open,
    Alarm,
    Armed,
    Excluded,
    Isolated,
    Inhibited,
    Sabotated,
    Faulty,
    Unavailable,
    Unknown,
}

impl AlarmZoneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmZoneState::Rest => "rest",
            AlarmZoneState::Open => "open",
            AlarmZoneState::Alarm => "alarm",
            AlarmZoneState::Armed => "armed",
            AlarmZoneState::Excluded => "excluded",
            AlarmZoneState::Isolated => "isolated",
            AlarmZoneState::Inhibited => "inhibited",
            AlarmZoneState::Sabotated => "sabotated",
            AlarmZoneState::Faulty => "faulty",
            AlarmZoneState::Unavailable => "unavailable",
            AlarmZoneState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmZone {
    pub index: u32,
    pub name: String,
    pub status_api: String,
    pub status: i64,
    pub human_status: AlarmZoneState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreasAndZones {
    pub areas: BTreeMap<u32, AlarmArea>,
    pub zones: BTreeMap<u32, AlarmZone>,
}

/// Session shared by both device families
#[async_trait]
pub trait ComelitSession: Send + Sync {
    async fn login(&mut self) -> Result<(), ComelitError>;
    async fn logout(&mut self) -> Result<(), ComelitError>;
}

#[async_trait]
pub trait SerialBridgeApi: ComelitSession {
    async fn get_all_devices(
        &mut self,
    ) -> Result<BTreeMap<BridgeDeviceKind, BTreeMap<u32, BridgeObject>>, ComelitError>;
}

#[async_trait]
pub trait VedoApi: ComelitSession {
    async fn get_all_areas_and_zones(&mut self) -> Result<AreasAndZones, ComelitError>;
}

/// Creates clients for a Connection Config
pub trait ComelitConnector: Send + Sync {
    fn serial_bridge(&self, config: &ComelitConfig) -> Box<dyn SerialBridgeApi>;
    fn vedo(&self, config: &ComelitConfig) -> Box<dyn VedoApi>;
}
