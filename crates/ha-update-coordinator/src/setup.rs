//! Config entry setup shared by every polling integration

use std::sync::Arc;

use async_trait::async_trait;
use ha_config_entries::{ConfigEntry, LoadedEntry, SetupContext, SetupError};
use ha_core::Context;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::CoordinatorConfig;
use crate::coordinator::DataUpdateCoordinator;
use crate::poller::{Poller, PollerStatus};
use crate::source::UpdateSource;

/// Loaded config entry: a coordinator plus the poller driving it
pub struct PollingEntry<S: UpdateSource> {
    coordinator: Arc<DataUpdateCoordinator<S>>,
    poller: Mutex<Option<Poller>>,
    poller_status: Option<watch::Receiver<PollerStatus>>,
}

impl<S: UpdateSource> PollingEntry<S> {
    pub fn coordinator(&self) -> &Arc<DataUpdateCoordinator<S>> {
        &self.coordinator
    }

    /// Poller state, `None` when polling is disabled for the entry
    pub fn poller_status(&self) -> Option<watch::Receiver<PollerStatus>> {
        self.poller_status.clone()
    }
}

#[async_trait]
impl<S: UpdateSource> LoadedEntry for PollingEntry<S> {
    async fn unload(&self) -> Result<(), String> {
        if let Some(poller) = self.poller.lock().await.take() {
            poller.stop().await;
        }
        self.coordinator.shutdown().await;
        Ok(())
    }
}

/// Build a coordinator for `entry`, refresh it once, register its devices
/// and start polling
///
/// The first refresh decides the setup outcome: connection and data
/// failures leave the entry not ready, credential failures require
/// reauthentication.
pub async fn setup_polling<S: UpdateSource>(
    entry: &ConfigEntry,
    ctx: SetupContext,
    context: Context,
    source: S,
    config: CoordinatorConfig,
) -> Result<Arc<PollingEntry<S>>, SetupError> {
    let coordinator = DataUpdateCoordinator::new(context, source, config)
        .map_err(|e| SetupError::Failed(e.to_string()))?;
    let coordinator = Arc::new(coordinator);

    if let Err(e) = coordinator.first_refresh().await {
        coordinator.shutdown().await;
        return Err(e);
    }

    for device in coordinator.devices().await {
        ctx.devices.get_or_create(&entry.entry_id, &device);
    }

    let poller = if entry.pref_disable_polling {
        debug!("Polling disabled for entry {}", entry.entry_id);
        None
    } else {
        info!(
            "Polling {} every {:?}",
            coordinator.context().name,
            coordinator.update_interval()
        );
        Some(Poller::spawn_with_reauth(
            coordinator.clone(),
            CancellationToken::new(),
            ctx.reauth,
        ))
    };

    Ok(Arc::new(PollingEntry {
        poller_status: poller.as_ref().map(Poller::status),
        poller: Mutex::new(poller),
        coordinator,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::{ScriptedSource, Step};
    use ha_config_entries::ConfigEntries;
    use ha_core::ErrorKind;
    use ha_registries::Storage;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unload_stops_poller_and_closes_session() {
        let temp_dir = TempDir::new().unwrap();
        let entries = ConfigEntries::new(Arc::new(Storage::new(temp_dir.path())));
        let entry = ConfigEntry::new("test", "scripted");
        let source = ScriptedSource::new([Step::Records(vec![("zone", 1)])]);
        let closed = source.closed.clone();

        let loaded = setup_polling(
            &entry,
            entries.setup_context(&entry),
            Context::new("test", "scripted"),
            source,
            CoordinatorConfig::default(),
        )
        .await
        .unwrap();
        let status = loaded.poller_status().unwrap();
        assert_eq!(*status.borrow(), PollerStatus::Running);
        assert_eq!(loaded.coordinator().data().len(), 1);

        loaded.unload().await.unwrap();

        assert_eq!(*status.borrow(), PollerStatus::Stopped);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_first_refresh_is_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let entries = ConfigEntries::new(Arc::new(Storage::new(temp_dir.path())));
        let entry = ConfigEntry::new("test", "scripted");
        let source = ScriptedSource::new([Step::LoginFails(ErrorKind::CannotConnect)]);
        let closed = source.closed.clone();

        let result = setup_polling(
            &entry,
            entries.setup_context(&entry),
            Context::new("test", "scripted"),
            source,
            CoordinatorConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(SetupError::NotReady(_))));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_polling_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let entries = ConfigEntries::new(Arc::new(Storage::new(temp_dir.path())));
        let mut entry = ConfigEntry::new("test", "scripted");
        entry.pref_disable_polling = true;

        let loaded = setup_polling(
            &entry,
            entries.setup_context(&entry),
            Context::new("test", "scripted"),
            ScriptedSource::new([Step::Records(vec![("zone", 1)])]),
            CoordinatorConfig::default(),
        )
        .await
        .unwrap();

        assert!(loaded.poller_status().is_none());
        loaded.unload().await.unwrap();
    }
}
