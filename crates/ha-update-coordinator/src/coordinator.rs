//! Generic polling coordinator
//!
//! ```text
//! refresh: lock source → authenticate → fetch → publish Snapshot
//!                      ↘ connect/data/unknown error → UpdateFailed (snapshot kept)
//!                      ↘ auth error → AuthFailed → suspended (refresh → Suspended)
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use ha_config_entries::SetupError;
use ha_core::Context;
use ha_registries::DeviceInfo;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn, Instrument};

use crate::config::{CoordinatorConfig, CoordinatorConfigError, ReauthPolicy};
use crate::error::{UpdateError, UpdateResult};
use crate::snapshot::Snapshot;
use crate::source::UpdateSource;

/// Health of the most recent refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStatus {
    pub last_update_success: bool,
    /// Set on authentication failure; cleared only by a new coordinator
    pub suspended: bool,
    pub last_error: Option<UpdateError>,
}

impl Default for CoordinatorStatus {
    fn default() -> Self {
        Self {
            last_update_success: true,
            suspended: false,
            last_error: None,
        }
    }
}

/// Owns one remote session and publishes snapshots of its records
pub struct DataUpdateCoordinator<S: UpdateSource> {
    context: Context,
    config: CoordinatorConfig,
    source: Mutex<S>,
    data: watch::Sender<Snapshot<S::Key, S::Value>>,
    status: watch::Sender<CoordinatorStatus>,
}

impl<S: UpdateSource> DataUpdateCoordinator<S> {
    pub fn new(
        context: Context,
        source: S,
        config: CoordinatorConfig,
    ) -> Result<Self, CoordinatorConfigError> {
        config.validate()?;
        let (data, _) = watch::channel(Snapshot::empty());
        let (status, _) = watch::channel(CoordinatorStatus::default());
        Ok(Self {
            context,
            config,
            source: Mutex::new(source),
            data,
            status,
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn update_interval(&self) -> Duration {
        self.config.update_interval
    }

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<S::Key, S::Value>> {
        self.data.subscribe()
    }

    /// Receive refresh health changes
    pub fn subscribe_status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.status.subscribe()
    }

    /// Currently published snapshot
    pub fn data(&self) -> Snapshot<S::Key, S::Value> {
        self.data.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.status.borrow().last_update_success
    }

    pub fn is_suspended(&self) -> bool {
        self.status.borrow().suspended
    }

    pub fn last_error(&self) -> Option<UpdateError> {
        self.status.borrow().last_error.clone()
    }

    /// Hub device and the devices behind it, as of the current snapshot
    pub async fn devices(&self) -> Vec<DeviceInfo> {
        let source = self.source.lock().await;
        let snapshot = self.data();
        source
            .device_info()
            .into_iter()
            .chain(source.child_devices(&snapshot))
            .collect()
    }

    /// Run one authenticate + fetch cycle and publish the result
    ///
    /// Concurrent callers wait for the running cycle. A failure anywhere in
    /// the cycle publishes nothing.
    pub async fn refresh(&self) -> UpdateResult<()> {
        let mut source = self.source.lock().await;
        if self.is_suspended() {
            return Err(UpdateError::Suspended);
        }

        let started = Instant::now();
        let result = poll(&mut *source).instrument(self.context.span()).await;

        match result {
            Ok(records) => {
                let snapshot = Snapshot::new(records);
                debug!(
                    "Finished fetching {} data in {:?} ({} records)",
                    self.context.name,
                    started.elapsed(),
                    snapshot.len()
                );
                self.data.send_replace(snapshot);
                self.record_success();
                Ok(())
            }
            Err(err) => Err(self.record_failure(UpdateError::from_source(&err))),
        }
    }

    /// Initial refresh during entry setup
    ///
    /// Connection and data failures mean the remote is not ready yet;
    /// authentication failures require the user.
    pub async fn first_refresh(&self) -> Result<(), SetupError> {
        self.refresh().await.map_err(SetupError::from)
    }

    /// Close the remote session
    pub async fn shutdown(&self) {
        let mut source = self.source.lock().await;
        source.close().instrument(self.context.span()).await;
        debug!("Closed {} session", self.context.name);
    }

    fn record_success(&self) {
        let recovered = !self.status.borrow().last_update_success;
        if recovered {
            info!("Fetching {} data recovered", self.context.name);
        }
        self.status.send_replace(CoordinatorStatus::default());
    }

    fn record_failure(&self, err: UpdateError) -> UpdateError {
        let was_healthy = self.status.borrow().last_update_success;

        match &err {
            UpdateError::AuthFailed { .. } => {
                warn!(
                    "Authentication failed while fetching {} data, suspending updates: {}",
                    self.context.name, err
                );
                if self.config.reauth_policy == ReauthPolicy::ClearSnapshot {
                    self.data.send_replace(Snapshot::empty());
                }
            }
            _ if was_healthy => error!("Error fetching {} data: {}", self.context.name, err),
            _ => debug!("Error fetching {} data: {}", self.context.name, err),
        }

        let suspended = err.is_auth();
        self.status.send_modify(|status| {
            status.last_update_success = false;
            status.suspended |= suspended;
            status.last_error = Some(err.clone());
        });
        err
    }
}

async fn poll<S: UpdateSource>(source: &mut S) -> Result<BTreeMap<S::Key, S::Value>, S::Error> {
    source.authenticate().await?;
    source.fetch().await
}
