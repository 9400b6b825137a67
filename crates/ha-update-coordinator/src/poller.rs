//! Periodic scheduler driving a coordinator

use std::sync::Arc;

use ha_config_entries::ReauthTrigger;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::coordinator::DataUpdateCoordinator;
use crate::error::UpdateError;
use crate::source::UpdateSource;

/// Lifecycle of a poller task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    Running,
    /// Stopped after an authentication failure
    ReauthRequired,
    /// Cancelled
    Stopped,
}

/// Background task refreshing a coordinator every `update_interval`
///
/// Ticks that fall behind are delayed rather than bunched up, so refreshes
/// never overlap. The first tick is skipped: setup has already refreshed.
pub struct Poller {
    cancel: CancellationToken,
    status: watch::Receiver<PollerStatus>,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<S: UpdateSource>(
        coordinator: Arc<DataUpdateCoordinator<S>>,
        cancel: CancellationToken,
    ) -> Self {
        Self::start(coordinator, cancel, None)
    }

    /// Spawn a poller that asks for reauthentication when credentials are rejected
    pub fn spawn_with_reauth<S: UpdateSource>(
        coordinator: Arc<DataUpdateCoordinator<S>>,
        cancel: CancellationToken,
        reauth: ReauthTrigger,
    ) -> Self {
        Self::start(coordinator, cancel, Some(reauth))
    }

    fn start<S: UpdateSource>(
        coordinator: Arc<DataUpdateCoordinator<S>>,
        cancel: CancellationToken,
        reauth: Option<ReauthTrigger>,
    ) -> Self {
        let (tx, status) = watch::channel(PollerStatus::Running);
        let span = coordinator.context().span();
        let handle = tokio::spawn(
            poll_task(coordinator, cancel.clone(), tx, reauth).instrument(span),
        );
        Self {
            cancel,
            status,
            handle,
        }
    }

    pub fn status(&self) -> watch::Receiver<PollerStatus> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        *self.status.borrow() == PollerStatus::Running
    }

    /// Cancel the task and wait for it to finish
    ///
    /// A refresh in flight is abandoned without publishing.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            debug!("Poller task ended abnormally: {}", e);
        }
    }
}

async fn poll_task<S: UpdateSource>(
    coordinator: Arc<DataUpdateCoordinator<S>>,
    cancel: CancellationToken,
    status: watch::Sender<PollerStatus>,
    reauth: Option<ReauthTrigger>,
) {
    let mut interval = tokio::time::interval(coordinator.update_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("Abandoning in-flight refresh of {}", coordinator.context().name);
                        break;
                    }
                    result = coordinator.refresh() => result,
                };

                if let Err(UpdateError::AuthFailed { .. } | UpdateError::Suspended) = result {
                    info!("Polling of {} stopped until reauthentication", coordinator.context().name);
                    if let Some(ref reauth) = reauth {
                        reauth.request();
                    }
                    status.send_replace(PollerStatus::ReauthRequired);
                    return;
                }
            }
        }
    }

    status.send_replace(PollerStatus::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::coordinator::tests::{coordinator, ScriptedSource, Step};
    use ha_core::ErrorKind;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn config() -> CoordinatorConfig {
        CoordinatorConfig::new(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_interval() {
        let source = ScriptedSource::new([
            Step::Records(vec![("zone", 1)]),
            Step::LoginFails(ErrorKind::CannotConnect),
            Step::Records(vec![("zone", 3)]),
        ]);
        let fetches = source.fetches.clone();
        let coordinator = Arc::new(coordinator(source, config()));
        let poller = Poller::spawn(coordinator.clone(), CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(coordinator.data().get(&"zone".to_string()), Some(&1));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!coordinator.last_update_success());
        assert!(poller.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(coordinator.data().get(&"zone".to_string()), Some(&3));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_stops_polling() {
        let source = ScriptedSource::new([Step::LoginFails(ErrorKind::CannotAuthenticate)]);
        let coordinator = Arc::new(coordinator(source, config()));
        let poller = Poller::spawn(coordinator.clone(), CancellationToken::new());
        let mut status = poller.status();

        status.changed().await.unwrap();

        assert_eq!(*status.borrow(), PollerStatus::ReauthRequired);
        assert!(coordinator.is_suspended());
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_in_flight_refresh() {
        let source = ScriptedSource::new([Step::Hang]);
        let fetches = source.fetches.clone();
        let coordinator = Arc::new(coordinator(source, config()));
        let cancel = CancellationToken::new();
        let poller = Poller::spawn(coordinator.clone(), cancel.clone());
        let status = poller.status();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        poller.stop().await;

        assert_eq!(*status.borrow(), PollerStatus::Stopped);
        assert!(coordinator.data().is_empty());
        assert!(coordinator.last_update_success());
    }
}
