//! Immutable point-in-time view of remote state

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Records fetched in one successful refresh
///
/// Cloning shares the underlying map; a snapshot is never modified after
/// it has been published.
pub struct Snapshot<K, V> {
    records: Arc<BTreeMap<K, V>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl<K: Ord, V> Snapshot<K, V> {
    /// Snapshot published before the first successful refresh
    pub fn empty() -> Self {
        Self {
            records: Arc::new(BTreeMap::new()),
            fetched_at: None,
        }
    }

    pub fn new(records: BTreeMap<K, V>) -> Self {
        Self {
            records: Arc::new(records),
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.records.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, K, V> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the records were fetched, `None` for the empty initial snapshot
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Whether both snapshots share the same published map
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }
}

impl<K, V> Clone for Snapshot<K, V> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            fetched_at: self.fetched_at,
        }
    }
}

impl<K: Ord, V> Default for Snapshot<K, V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for Snapshot<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Snapshot<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("fetched_at", &self.fetched_at)
            .field("records", &self.records)
            .finish()
    }
}

impl<'a, K, V> IntoIterator for &'a Snapshot<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = btree_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot: Snapshot<String, u32> = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert!(snapshot.fetched_at().is_none());
    }

    #[test]
    fn test_clone_shares_records() {
        let snapshot = Snapshot::new(BTreeMap::from([("zone".to_string(), 1)]));
        let cloned = snapshot.clone();

        assert!(snapshot.ptr_eq(&cloned));
        assert_eq!(cloned.get(&"zone".to_string()), Some(&1));
        assert!(cloned.fetched_at().is_some());
    }

    #[test]
    fn test_equality_ignores_fetch_time() {
        let a = Snapshot::new(BTreeMap::from([(1, "a")]));
        let b = Snapshot::new(BTreeMap::from([(1, "a")]));
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a, Snapshot::new(BTreeMap::from([(1, "b")])));
    }

    #[test]
    fn test_iteration_is_ordered() {
        let snapshot = Snapshot::new(BTreeMap::from([(3, "c"), (1, "a"), (2, "b")]));
        let keys: Vec<_> = snapshot.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!((&snapshot).into_iter().count(), 3);
    }
}
