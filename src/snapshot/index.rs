//! Index of expiring snapshots, ordered by expiration instant.
//!
//! Keyed by (expires_at, snapshot_id): eviction proceeds in non-decreasing
//! expiration order, and ties on the instant break deterministically on the
//! snapshot id. The tree form (rather than a binary heap) is what makes
//! removal of an arbitrary, not-necessarily-minimal entry cheap.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::entity::TableSnapshot;

type Key = (DateTime<Utc>, String);

#[derive(Debug, Default)]
pub struct ExpirationIndex {
    entries: BTreeMap<Key, TableSnapshot>,
}

impl ExpirationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(snapshot: &TableSnapshot) -> Option<Key> {
        snapshot
            .expires_at()
            .map(|t| (t, snapshot.snapshot_id().to_string()))
    }

    /// Admit an expiring snapshot. Non-expiring snapshots are ignored.
    /// Returns true when the snapshot was inserted.
    pub fn insert(&mut self, snapshot: TableSnapshot) -> bool {
        match Self::key(&snapshot) {
            Some(key) => {
                self.entries.insert(key, snapshot);
                true
            }
            None => false,
        }
    }

    /// The snapshot with the smallest expiration instant, if any.
    pub fn peek_earliest(&self) -> Option<&TableSnapshot> {
        self.entries.values().next()
    }

    /// Remove a specific snapshot. Returns true when it was present.
    pub fn remove(&mut self, snapshot: &TableSnapshot) -> bool {
        match Self::key(snapshot) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshots in expiration order.
    pub fn iter(&self) -> impl Iterator<Item = &TableSnapshot> {
        self.entries.values()
    }
}
