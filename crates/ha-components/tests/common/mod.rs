#![allow(dead_code)]
// Shared fakes for the integration tests

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ha_components::aquacell::{
    AquacellApi, AquacellConnector, AquacellError, Brand, Salt, Softener, WifiLevel,
};
use ha_components::comelit::{
    AlarmArea, AlarmAreaState, AlarmZone, AlarmZoneState, AreasAndZones, BridgeDeviceKind,
    BridgeObject, ComelitConfig, ComelitConnector, ComelitError, ComelitSession,
    SerialBridgeApi, VedoApi,
};
use ha_components::{register_integrations, IntegrationsConfig};
use ha_config_entries::{ConfigData, ConfigEntries, FlowManager};
use ha_registries::Storage;
use serde_json::Value;
use tempfile::TempDir;

pub fn data(value: Value) -> ConfigData {
    value.as_object().cloned().unwrap_or_default()
}

/// A config entries manager with every integration registered
pub struct Harness {
    pub _dir: TempDir,
    pub entries: Arc<ConfigEntries>,
    pub flows: FlowManager,
    pub comelit: Arc<ComelitPanel>,
    pub aquacell: Arc<AquacellCloud>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(IntegrationsConfig::default())
    }

    pub fn with_config(config: IntegrationsConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(dir.path()))));
        let comelit = Arc::new(ComelitPanel::default());
        let aquacell = Arc::new(AquacellCloud::default());
        register_integrations(
            &entries,
            &config,
            Arc::new(FakeComelit(comelit.clone())),
            Arc::new(FakeAquacell(aquacell.clone())),
        );
        Self {
            _dir: dir,
            flows: FlowManager::new(entries.clone()),
            entries,
            comelit,
            aquacell,
        }
    }
}

// ── Comelit ─────────────────────────────────────────────────────────

/// State shared by every client the fake connector hands out
#[derive(Default)]
pub struct ComelitPanel {
    failures: Mutex<VecDeque<ComelitError>>,
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub configs: Mutex<Vec<ComelitConfig>>,
}

impl ComelitPanel {
    /// Queue a failure for the next login
    pub fn fail_login(&self, err: ComelitError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    fn login(&self) -> Result<(), ComelitError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn bridge_object(kind: BridgeDeviceKind, index: u32, name: &str, power: f64) -> BridgeObject {
    BridgeObject {
        index,
        name: name.to_string(),
        status: 1,
        human_status: "on".to_string(),
        kind,
        protected: false,
        zone: "Home".to_string(),
        power,
        power_unit: "W".to_string(),
    }
}

struct FakeComelit(Arc<ComelitPanel>);

impl ComelitConnector for FakeComelit {
    fn serial_bridge(&self, config: &ComelitConfig) -> Box<dyn SerialBridgeApi> {
        self.0.configs.lock().unwrap().push(config.clone());
        Box::new(FakeClient(self.0.clone()))
    }

    fn vedo(&self, config: &ComelitConfig) -> Box<dyn VedoApi> {
        self.0.configs.lock().unwrap().push(config.clone());
        Box::new(FakeClient(self.0.clone()))
    }
}

struct FakeClient(Arc<ComelitPanel>);

#[async_trait]
impl ComelitSession for FakeClient {
    async fn login(&mut self) -> Result<(), ComelitError> {
        self.0.login()
    }

    async fn logout(&mut self) -> Result<(), ComelitError> {
        self.0.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SerialBridgeApi for FakeClient {
    async fn get_all_devices(
        &mut self,
    ) -> Result<BTreeMap<BridgeDeviceKind, BTreeMap<u32, BridgeObject>>, ComelitError> {
        Ok(BTreeMap::from([
            (
                BridgeDeviceKind::Light,
                BTreeMap::from([(1, bridge_object(BridgeDeviceKind::Light, 1, "Kitchen", 0.0))]),
            ),
            (
                BridgeDeviceKind::Other,
                BTreeMap::from([(
                    0,
                    bridge_object(BridgeDeviceKind::Other, 0, "Washing machine", 12.5),
                )]),
            ),
        ]))
    }
}

#[async_trait]
impl VedoApi for FakeClient {
    async fn get_all_areas_and_zones(&mut self) -> Result<AreasAndZones, ComelitError> {
        let area = AlarmArea {
            index: 0,
            name: "Ground floor".to_string(),
            p1: false,
            p2: false,
            ready: true,
            armed: 0,
            alarm: false,
            alarm_memory: false,
            sabotage: false,
            anomaly: false,
            in_time: false,
            out_time: false,
            human_status: AlarmAreaState::Disarmed,
        };
        let zone = AlarmZone {
            index: 1,
            name: "Front door".to_string(),
            status_api: "0001".to_string(),
            status: 1,
            human_status: AlarmZoneState::Open,
        };
        Ok(AreasAndZones {
            areas: BTreeMap::from([(0, area)]),
            zones: BTreeMap::from([(1, zone)]),
        })
    }
}

// ── Aquacell ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct AquacellCloud {
    failures: Mutex<VecDeque<AquacellError>>,
    pub password_logins: AtomicUsize,
    pub refresh_logins: Mutex<Vec<String>>,
    pub brands: Mutex<Vec<Brand>>,
}

impl AquacellCloud {
    pub fn fail_next(&self, err: AquacellError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn password_logins(&self) -> usize {
        self.password_logins.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<(), AquacellError> {
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn softener(dsn: &str) -> Softener {
    Softener {
        dsn: dsn.to_string(),
        name: "AquaCell name".to_string(),
        ssn: "00000000000000000000".to_string(),
        fw_version: "v1.0".to_string(),
        salt: Salt {
            left_percent: 100,
            right_percent: 80,
            left_days: 30,
            right_days: 25,
        },
        battery: 40,
        wifi_level: WifiLevel::High,
        last_update: 1_700_000_000,
    }
}

struct FakeAquacell(Arc<AquacellCloud>);

impl AquacellConnector for FakeAquacell {
    fn connect(&self, brand: Brand) -> Box<dyn AquacellApi> {
        self.0.brands.lock().unwrap().push(brand);
        Box::new(FakeAquacellClient(self.0.clone()))
    }
}

struct FakeAquacellClient(Arc<AquacellCloud>);

#[async_trait]
impl AquacellApi for FakeAquacellClient {
    async fn authenticate(&mut self, _email: &str, _password: &str) -> Result<String, AquacellError> {
        self.0.password_logins.fetch_add(1, Ordering::SeqCst);
        self.0.next()?;
        Ok(format!("refresh-token-{}", self.0.password_logins()))
    }

    async fn authenticate_refresh(&mut self, refresh_token: &str) -> Result<(), AquacellError> {
        self.0
            .refresh_logins
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.0.next()
    }

    async fn get_all_softeners(&mut self) -> Result<Vec<Softener>, AquacellError> {
        Ok(vec![softener("DSN")])
    }
}
