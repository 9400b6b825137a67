//! Config Entries Manager
//!
//! Owns every config entry, persists them, and drives integration setup
//! and unload through the lifecycle state machine.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ha_registries::{DeviceRegistry, Storable, Storage, StorageResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::entry::{ConfigData, ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::flow::ConfigFlow;
use crate::state_machine::{retry_delay, InvalidTransition};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

const REAUTH_CHANNEL_CAPACITY: usize = 64;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("No integration registered for domain {0}")]
    UnknownIntegration(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup not ready, retrying in {retry_in:?}: {reason}")]
    NotReady { reason: String, retry_in: Duration },

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] ha_registries::StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Why an integration could not set up an entry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    /// Remote unreachable for now; setup is retried later
    #[error("not ready: {0}")]
    NotReady(String),

    /// Credentials rejected; the user must reauthenticate
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("{0}")]
    Failed(String),
}

/// Request to run a reauthentication flow for an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReauthRequest {
    pub entry_id: String,
    pub domain: String,
}

/// Handle given to an integration so it can ask for reauthentication
#[derive(Debug, Clone)]
pub struct ReauthTrigger {
    request: ReauthRequest,
    sender: broadcast::Sender<ReauthRequest>,
    pending: Arc<DashMap<String, ReauthRequest>>,
}

impl ReauthTrigger {
    /// Ask the host to start a reauth flow; repeated requests are coalesced
    pub fn request(&self) {
        if self.pending.contains_key(&self.request.entry_id) {
            return;
        }
        self.pending
            .insert(self.request.entry_id.clone(), self.request.clone());
        info!(
            "Reauthentication required for {} entry {}",
            self.request.domain, self.request.entry_id
        );
        // No receivers just means nobody is listening yet; the request stays pending
        let _ = self.sender.send(self.request.clone());
    }

    pub fn entry_id(&self) -> &str {
        &self.request.entry_id
    }
}

/// Everything an integration receives while setting up an entry
#[derive(Clone)]
pub struct SetupContext {
    pub devices: Arc<DeviceRegistry>,
    pub reauth: ReauthTrigger,
}

/// Runtime state of a loaded entry
#[async_trait]
pub trait LoadedEntry: Send + Sync {
    /// Stop polling and release the remote session
    async fn unload(&self) -> Result<(), String>;

    /// Current entity states keyed by unique id
    fn states(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }
}

/// An integration module: a config flow plus entry setup
#[async_trait]
pub trait Integration: Send + Sync {
    /// Integration domain (e.g., "comelit")
    fn domain(&self) -> &str;

    /// Create a handler for a new config flow
    fn create_flow(&self) -> Box<dyn ConfigFlow>;

    /// Set up a config entry, returning its runtime handle
    async fn setup_entry(
        &self,
        entry: &ConfigEntry,
        ctx: SetupContext,
    ) -> Result<Arc<dyn LoadedEntry>, SetupError>;
}

/// Config Entries Manager
pub struct ConfigEntries {
    storage: Arc<Storage>,

    devices: Arc<DeviceRegistry>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Per-entry locks serializing setup and unload of one entry
    setup_locks: DashMap<String, Arc<Mutex<()>>>,

    /// Keeps snapshot and write of the entries file in one step
    save_lock: Mutex<()>,

    integrations: DashMap<String, Arc<dyn Integration>>,

    /// Runtime handles of loaded entries
    loaded: DashMap<String, Arc<dyn LoadedEntry>>,

    reauth_sender: broadcast::Sender<ReauthRequest>,

    pending_reauth: Arc<DashMap<String, ReauthRequest>>,
}

impl ConfigEntries {
    /// Create a manager persisting to `storage`
    pub fn new(storage: Arc<Storage>) -> Self {
        let (reauth_sender, _) = broadcast::channel(REAUTH_CHANNEL_CAPACITY);
        Self {
            devices: Arc::new(DeviceRegistry::new(storage.clone())),
            storage,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_locks: DashMap::new(),
            save_lock: Mutex::new(()),
            integrations: DashMap::new(),
            loaded: DashMap::new(),
            reauth_sender,
            pending_reauth: Arc::new(DashMap::new()),
        }
    }

    /// Device registry shared with integrations
    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    /// Load entries and devices from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load::<ConfigEntriesData>().await? {
            info!("Loading {} config entries from storage", data.entries.len());
            for entry in data.entries {
                self.index_entry(&entry);
            }
        }
        self.devices.load().await
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let _lock = self.save_lock.lock().await;
        let mut entries: Vec<ConfigEntry> =
            self.entries.iter().map(|r| r.value().clone()).collect();
        entries.sort_by_key(|e| e.created_at);
        let count = entries.len();
        self.storage.save(&ConfigEntriesData { entries }).await?;
        debug!("Saved {} config entries to storage", count);
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();
        self.entries.insert(entry_id.clone(), entry.clone());
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        self.entries.remove(&entry.entry_id);
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(&entry_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a new config entry
    ///
    /// The unique id is claimed atomically, so concurrent adds for the same
    /// remote leave exactly one entry.
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            match self
                .by_unique_id
                .entry((entry.domain.clone(), unique_id.clone()))
            {
                Entry::Occupied(_) => {
                    return Err(ConfigEntriesError::AlreadyExists {
                        domain: entry.domain.clone(),
                        unique_id: unique_id.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.entry_id.clone());
                }
            }
        }

        self.index_entry(&entry);
        if let Err(e) = self.save().await {
            warn!("Failed to persist entry {}: {}", entry.entry_id, e);
            self.unindex_entry(&entry);
            return Err(e.into());
        }

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Update title, options or preferences of an entry
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let updated = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            if let Some(title) = update.title {
                entry.title = title;
            }
            if let Some(options) = update.options {
                entry.options = options;
            }
            if let Some(pref) = update.pref_disable_polling {
                entry.pref_disable_polling = pref;
            }
            if let Some(disabled_by) = update.disabled_by {
                entry.disabled_by = disabled_by;
            }
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.save().await?;
        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Replace the Connection Config of an entry with a newly validated one
    ///
    /// The previous data map is discarded, never merged.
    pub async fn replace_data(
        &self,
        entry_id: &str,
        data: ConfigData,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let replaced = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            entry.data = data;
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.pending_reauth.remove(entry_id);
        self.save().await?;
        info!("Replaced configuration of entry {}", entry_id);
        Ok(replaced)
    }

    /// Remove an entry, unloading it first
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_loaded() {
            self.unload(entry_id).await?;
        }

        self.unindex_entry(&entry);
        self.pending_reauth.remove(entry_id);
        self.setup_locks.remove(entry_id);
        let removed_devices = self.devices.remove_config_entry(entry_id);
        self.save().await?;
        self.devices.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}], {} devices removed",
            entry.title, entry.domain, entry_id, removed_devices
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register an integration module
    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        let domain = integration.domain().to_string();
        debug!("Registered integration: {}", domain);
        self.integrations.insert(domain, integration);
    }

    pub fn integration(&self, domain: &str) -> Option<Arc<dyn Integration>> {
        self.integrations.get(domain).map(|r| r.value().clone())
    }

    /// Context handed to the integration when `entry` is set up
    pub fn setup_context(&self, entry: &ConfigEntry) -> SetupContext {
        SetupContext {
            devices: self.devices.clone(),
            reauth: ReauthTrigger {
                request: ReauthRequest {
                    entry_id: entry.entry_id.clone(),
                    domain: entry.domain.clone(),
                },
                sender: self.reauth_sender.clone(),
                pending: self.pending_reauth.clone(),
            },
        }
    }

    /// Receive reauthentication requests raised by loaded entries
    pub fn subscribe_reauth(&self) -> broadcast::Receiver<ReauthRequest> {
        self.reauth_sender.subscribe()
    }

    /// Entity states of a loaded entry
    pub fn entity_states(&self, entry_id: &str) -> Option<BTreeMap<String, serde_json::Value>> {
        self.loaded.get(entry_id).map(|loaded| loaded.states())
    }

    /// Whether a reauthentication is outstanding for the entry
    pub fn pending_reauth(&self, entry_id: &str) -> bool {
        self.pending_reauth.contains_key(entry_id)
    }

    fn entry_lock(&self, entry_id: &str) -> Arc<Mutex<()>> {
        self.setup_locks
            .entry(entry_id.to_string())
            .or_default()
            .clone()
    }

    /// Set up an entry through its integration
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let lock = self.entry_lock(entry_id);
        let _guard = lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_disabled() {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(());
        }
        if entry.is_loaded() {
            debug!("Entry {} already loaded", entry_id);
            return Ok(());
        }

        let integration = self
            .integration(&entry.domain)
            .ok_or_else(|| ConfigEntriesError::UnknownIntegration(entry.domain.clone()))?;

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let ctx = self.setup_context(&entry);

        match integration.setup_entry(&entry, ctx.clone()).await {
            Ok(loaded) => {
                self.loaded.insert(entry_id.to_string(), loaded);
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                if let Err(e) = self.devices.save().await {
                    warn!("Failed to save device registry: {}", e);
                }
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(SetupError::NotReady(reason)) => {
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupRetry,
                    Some(reason.clone()),
                )?;
                let tries = self
                    .entries
                    .get_mut(entry_id)
                    .map(|mut e| e.increment_tries())
                    .unwrap_or(1);
                let retry_in = retry_delay(tries - 1);
                warn!(
                    "Entry {} not ready yet ({}), retrying in {:?}",
                    entry_id, reason, retry_in
                );
                Err(ConfigEntriesError::NotReady { reason, retry_in })
            }
            Err(SetupError::AuthFailed(reason)) => {
                warn!("Authentication failed for entry {}: {}", entry_id, reason);
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some(reason.clone()),
                )?;
                ctx.reauth.request();
                Err(ConfigEntriesError::SetupFailed(reason))
            }
            Err(SetupError::Failed(reason)) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some(reason.clone()),
                )?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Unload an entry, stopping its coordinator
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let lock = self.entry_lock(entry_id);
        let _guard = lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(()),
            state if !state.is_recoverable() => {
                return Err(ConfigEntriesError::CannotUnload(state))
            }
            _ => {}
        }

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        if let Some((_, loaded)) = self.loaded.remove(entry_id) {
            if let Err(reason) = loaded.unload().await {
                warn!("Unload failed for entry {}: {}", entry_id, reason);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(reason.clone()),
                )?;
                return Err(ConfigEntriesError::UnloadFailed(reason));
            }
        }

        self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
        info!("Unloaded entry: {} ({})", entry.title, entry_id);
        Ok(())
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Set up every entry, returning per-entry results
    pub async fn setup_all(&self) -> Vec<(String, ConfigEntriesResult<()>)> {
        let entry_ids: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        let mut results = Vec::with_capacity(entry_ids.len());
        for entry_id in entry_ids {
            let result = self.setup(&entry_id).await;
            results.push((entry_id, result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{FlowContext, StepResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    struct NoopFlow;

    #[async_trait]
    impl ConfigFlow for NoopFlow {
        async fn step(
            &mut self,
            _step_id: &str,
            _user_input: Option<ConfigData>,
            _ctx: &FlowContext,
        ) -> StepResult {
            StepResult::abort("not_supported")
        }
    }

    struct CountingEntry(Arc<AtomicUsize>);

    #[async_trait]
    impl LoadedEntry for CountingEntry {
        async fn unload(&self) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeIntegration {
        outcome: Result<(), SetupError>,
        unloads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Integration for FakeIntegration {
        fn domain(&self) -> &str {
            "fake"
        }

        fn create_flow(&self) -> Box<dyn ConfigFlow> {
            Box::new(NoopFlow)
        }

        async fn setup_entry(
            &self,
            _entry: &ConfigEntry,
            _ctx: SetupContext,
        ) -> Result<Arc<dyn LoadedEntry>, SetupError> {
            self.outcome.clone()?;
            Ok(Arc::new(CountingEntry(self.unloads.clone())))
        }
    }

    fn create_test_manager(outcome: Result<(), SetupError>) -> (TempDir, ConfigEntries, Arc<AtomicUsize>) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        let unloads = Arc::new(AtomicUsize::new(0));
        manager.register_integration(Arc::new(FakeIntegration {
            outcome,
            unloads: unloads.clone(),
        }));
        (temp_dir, manager, unloads)
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (_dir, manager, _) = create_test_manager(Ok(()));

        manager
            .add(ConfigEntry::new("fake", "One").with_unique_id("same-id"))
            .await
            .unwrap();
        let result = manager
            .add(ConfigEntry::new("fake", "Two").with_unique_id("same-id"))
            .await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let (_dir, manager, unloads) = create_test_manager(Ok(()));
        let entry = manager.add(ConfigEntry::new("fake", "Test")).await.unwrap();

        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
        assert_eq!(unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_setup_not_ready_schedules_retry() {
        let (_dir, manager, _) =
            create_test_manager(Err(SetupError::NotReady("timeout".to_string())));
        let entry = manager.add(ConfigEntry::new("fake", "Test")).await.unwrap();

        let result = manager.setup(&entry.entry_id).await;

        match result {
            Err(ConfigEntriesError::NotReady { retry_in, .. }) => {
                assert!(retry_in >= Duration::from_secs(5));
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
        let stored = manager.get(&entry.entry_id).unwrap();
        assert_eq!(stored.state, ConfigEntryState::SetupRetry);
        assert_eq!(stored.tries, 1);
    }

    #[tokio::test]
    async fn test_setup_auth_failure_requests_reauth() {
        let (_dir, manager, _) =
            create_test_manager(Err(SetupError::AuthFailed("bad pin".to_string())));
        let mut reauth = manager.subscribe_reauth();
        let entry = manager.add(ConfigEntry::new("fake", "Test")).await.unwrap();

        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupError
        );
        assert!(manager.pending_reauth(&entry.entry_id));
        let request = reauth.recv().await.unwrap();
        assert_eq!(request.entry_id, entry.entry_id);
        assert_eq!(request.domain, "fake");
    }

    #[tokio::test]
    async fn test_replace_data_clears_pending_reauth() {
        let (_dir, manager, _) =
            create_test_manager(Err(SetupError::AuthFailed("bad pin".to_string())));
        let mut data = ConfigData::new();
        data.insert("pin".to_string(), serde_json::json!(1));
        let entry = manager
            .add(ConfigEntry::new("fake", "Test").with_data(data))
            .await
            .unwrap();
        let _ = manager.setup(&entry.entry_id).await;

        let mut new_data = ConfigData::new();
        new_data.insert("pin".to_string(), serde_json::json!(2));
        let replaced = manager
            .replace_data(&entry.entry_id, new_data.clone())
            .await
            .unwrap();

        assert_eq!(replaced.data, new_data);
        assert!(!manager.pending_reauth(&entry.entry_id));
    }

    #[tokio::test]
    async fn test_remove_unloads_entry() {
        let (_dir, manager, unloads) = create_test_manager(Ok(()));
        let entry = manager.add(ConfigEntry::new("fake", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        manager.remove(&entry.entry_id).await.unwrap();

        assert!(manager.is_empty());
        assert_eq!(unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_integration() {
        let (_dir, manager, _) = create_test_manager(Ok(()));
        let entry = manager.add(ConfigEntry::new("other", "Test")).await.unwrap();

        let result = manager.setup(&entry.entry_id).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::UnknownIntegration(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        {
            let manager = ConfigEntries::new(storage.clone());
            manager
                .add(ConfigEntry::new("fake", "Test").with_unique_id("test-123"))
                .await
                .unwrap();
        }

        let manager = ConfigEntries::new(storage);
        manager.load().await.unwrap();
        assert_eq!(manager.len(), 1);
        let entry = manager.get_by_unique_id("fake", "test-123").unwrap();
        assert_eq!(entry.title, "Test");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_keep_one_entry_per_unique_id() {
        let (_dir, manager, _) = create_test_manager(Ok(()));
        let manager = Arc::new(manager);

        for round in 0..20 {
            let barrier = Arc::new(tokio::sync::Barrier::new(8));
            let adds: Vec<_> = (0..8)
                .map(|n| {
                    let manager = manager.clone();
                    let barrier = barrier.clone();
                    tokio::spawn(async move {
                        barrier.wait().await;
                        manager
                            .add(
                                ConfigEntry::new("fake", format!("Panel {n}"))
                                    .with_unique_id(format!("panel-{round}")),
                            )
                            .await
                    })
                })
                .collect();

            let mut added = 0;
            for add in adds {
                match add.await.unwrap() {
                    Ok(_) => added += 1,
                    Err(ConfigEntriesError::AlreadyExists { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(added, 1, "round {round}");
        }
        assert_eq!(manager.len(), 20);
        assert_eq!(manager.get_by_domain("fake").len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_all_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = Arc::new(ConfigEntries::new(storage.clone()));

        let barrier = Arc::new(tokio::sync::Barrier::new(16));
        let adds: Vec<_> = (0..16)
            .map(|n| {
                let manager = manager.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    manager
                        .add(
                            ConfigEntry::new("fake", format!("Panel {n}"))
                                .with_unique_id(format!("panel-{n}")),
                        )
                        .await
                })
            })
            .collect();
        for add in adds {
            add.await.unwrap().unwrap();
        }

        let reloaded = ConfigEntries::new(storage);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.len(), 16);
        for n in 0..16 {
            assert!(reloaded.get_by_unique_id("fake", &format!("panel-{n}")).is_some());
        }
    }

    #[tokio::test]
    async fn test_failed_save_leaves_no_entry() {
        let temp_dir = TempDir::new().unwrap();
        // A plain file where the storage directory should be
        std::fs::write(temp_dir.path().join(".storage"), "").unwrap();
        let manager = ConfigEntries::new(Arc::new(Storage::new(temp_dir.path())));

        let result = manager
            .add(ConfigEntry::new("fake", "Test").with_unique_id("test-123"))
            .await;

        assert!(matches!(result, Err(ConfigEntriesError::Storage(_))));
        assert!(manager.is_empty());
        assert!(manager.get_by_unique_id("fake", "test-123").is_none());
        assert!(manager.get_by_domain("fake").is_empty());
    }

    /// Holds setup of the entry titled "slow" until released
    #[derive(Default)]
    struct GatedIntegration {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl Integration for GatedIntegration {
        fn domain(&self) -> &str {
            "gated"
        }

        fn create_flow(&self) -> Box<dyn ConfigFlow> {
            Box::new(NoopFlow)
        }

        async fn setup_entry(
            &self,
            entry: &ConfigEntry,
            _ctx: SetupContext,
        ) -> Result<Arc<dyn LoadedEntry>, SetupError> {
            if entry.title == "slow" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(Arc::new(CountingEntry(Arc::new(AtomicUsize::new(0)))))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_setup_does_not_block_other_entries() {
        let temp_dir = TempDir::new().unwrap();
        let manager = Arc::new(ConfigEntries::new(Arc::new(Storage::new(temp_dir.path()))));
        let gated = Arc::new(GatedIntegration::default());
        manager.register_integration(gated.clone());
        let slow = manager.add(ConfigEntry::new("gated", "slow")).await.unwrap();
        let fast = manager.add(ConfigEntry::new("gated", "fast")).await.unwrap();

        let slow_setup = tokio::spawn({
            let manager = manager.clone();
            let entry_id = slow.entry_id.clone();
            async move { manager.setup(&entry_id).await }
        });
        gated.entered.notified().await;

        tokio::time::timeout(Duration::from_secs(5), manager.setup(&fast.entry_id))
            .await
            .expect("setup of another entry was blocked")
            .unwrap();
        assert!(manager.get(&fast.entry_id).unwrap().is_loaded());
        assert_eq!(
            manager.get(&slow.entry_id).unwrap().state,
            ConfigEntryState::SetupInProgress
        );

        gated.release.notify_one();
        slow_setup.await.unwrap().unwrap();
        assert!(manager.get(&slow.entry_id).unwrap().is_loaded());
    }
}
