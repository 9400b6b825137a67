//! Read-only per-record views of a coordinator

use tokio::sync::watch;

use crate::coordinator::{CoordinatorStatus, DataUpdateCoordinator};
use crate::snapshot::Snapshot;
use crate::source::UpdateSource;

/// View of one record in a coordinator's snapshots
///
/// Entities never talk to the remote; they only read what the coordinator
/// published.
pub struct CoordinatorEntity<K, V> {
    key: K,
    data: watch::Receiver<Snapshot<K, V>>,
    status: watch::Receiver<CoordinatorStatus>,
}

impl<K: Ord + Clone, V> CoordinatorEntity<K, V> {
    pub fn new<S>(coordinator: &DataUpdateCoordinator<S>, key: K) -> Self
    where
        S: UpdateSource<Key = K, Value = V>,
    {
        Self {
            key,
            data: coordinator.subscribe(),
            status: coordinator.subscribe_status(),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// False when the last refresh failed, polling is suspended, or the
    /// record is gone from the snapshot
    pub fn available(&self) -> bool {
        let healthy = {
            let status = self.status.borrow();
            status.last_update_success && !status.suspended
        };
        healthy && self.data.borrow().contains_key(&self.key)
    }

    /// Read the current record
    pub fn with_record<R>(&self, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.data.borrow().get(&self.key).map(f)
    }

    /// Wait for the next published snapshot
    ///
    /// Returns false once the coordinator has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.data.changed().await.is_ok()
    }
}

impl<K: Ord + Clone, V: Clone> CoordinatorEntity<K, V> {
    pub fn record(&self) -> Option<V> {
        self.with_record(V::clone)
    }
}

impl<K: Clone, V> Clone for CoordinatorEntity<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            data: self.data.clone(),
            status: self.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::coordinator::tests::{coordinator, ScriptedSource, Step};
    use ha_core::ErrorKind;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[tokio::test]
    async fn test_availability_follows_refresh() {
        let coordinator = coordinator(
            ScriptedSource::new([
                Step::Records(vec![("zone", 1)]),
                Step::LoginFails(ErrorKind::CannotConnect),
                Step::Records(vec![("area", 2)]),
            ]),
            CoordinatorConfig::default(),
        );
        let zone = CoordinatorEntity::new(&coordinator, "zone".to_string());
        assert!(!zone.available());

        coordinator.refresh().await.unwrap();
        assert!(zone.available());
        assert_eq!(zone.record(), Some(1));

        let _ = coordinator.refresh().await;
        assert!(!zone.available());
        assert_eq!(zone.record(), Some(1));

        coordinator.refresh().await.unwrap();
        assert!(!zone.available());
        assert_eq!(zone.record(), None);
    }

    #[tokio::test]
    async fn test_suspended_entity_unavailable() {
        let coordinator = coordinator(
            ScriptedSource::new([
                Step::Records(vec![("zone", 1)]),
                Step::LoginFails(ErrorKind::CannotAuthenticate),
            ]),
            CoordinatorConfig::default(),
        );
        let zone = CoordinatorEntity::new(&coordinator, "zone".to_string());
        coordinator.refresh().await.unwrap();

        let _ = coordinator.refresh().await;

        assert!(!zone.available());
        assert_eq!(zone.with_record(|v| v * 10), Some(10));
    }

    #[tokio::test]
    async fn test_changed_wakes_on_publish() {
        let coordinator = coordinator(
            ScriptedSource::new([Step::Records(vec![("zone", 7)])]),
            CoordinatorConfig::default(),
        );
        let mut zone = CoordinatorEntity::new(&coordinator, "zone".to_string());

        {
            let mut changed = task::spawn(zone.changed());
            assert_pending!(changed.poll());

            coordinator.refresh().await.unwrap();

            assert!(changed.is_woken());
            assert_ready_eq!(changed.poll(), true);
        }
        assert_eq!(zone.record(), Some(7));
    }
}
