//! The project map: logical path -> entry, plus the modification-time cache
//! and the delta buckets every mutation is recorded into

use std::collections::BTreeMap;
use std::time::SystemTime;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::delta::{Audience, Delta, DeltaBucket, DeltaBuckets};
use crate::entry::MapEntry;

/// Root of every logical path
pub const TREE_ROOT: &str = "tree";

/// Owned mapping state
///
/// Entries are kept in a `BTreeMap` so serializing the map is deterministic.
#[derive(Debug, Default, Clone)]
pub struct ProjectMap {
    /// Logical path -> entry
    entries: BTreeMap<String, MapEntry>,

    /// Project-relative local path -> last observed modification time
    /// Uses AHashMap (lookups happen on every watcher event)
    mtimes: AHashMap<String, SystemTime>,

    deltas: DeltaBuckets,
}

impl ProjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an entry to a logical path
    ///
    /// Returns true when the assignment collided with an entry from a different
    /// source. The new entry wins either way; it keeps the document origin of the
    /// entry it replaces.
    pub fn assign(&mut self, key: &str, mut entry: MapEntry) -> bool {
        let mut collided = false;
        if let Some(existing) = self.entries.get(key) {
            if existing.local_path != entry.local_path && existing.project_json.is_none() {
                warn!("Collision on '{key}'");
                collided = true;
            }
            if entry.project_json.is_none() {
                entry.project_json = existing.project_json.clone();
            }
        }

        debug!(
            "Mapping {:?} {} -> {}",
            entry.kind,
            key,
            entry.local().unwrap_or_default()
        );
        self.deltas.record(key, Delta::Updated(entry.clone()));
        self.entries.insert(key.to_string(), entry);
        collided
    }

    /// Remove an entry and record a tombstone
    pub fn remove(&mut self, key: &str) -> Option<MapEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.deltas.record(key, Delta::Removed);
        }
        removed
    }

    /// Record a tombstone for a key that may already be gone
    pub fn tombstone(&mut self, key: &str) {
        self.entries.remove(key);
        self.deltas.record(key, Delta::Removed);
    }

    /// Re-announce an entry without changing it
    pub fn mark_modified(&mut self, key: &str) {
        if let Some(entry) = self.entries.get(key) {
            self.deltas.record(key, Delta::Updated(entry.clone()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&MapEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, MapEntry> {
        &self.entries
    }

    /// Snapshot of every key, safe to iterate while mutating the map
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Keys equal to `prefix` or beneath it
    pub fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|key| crate::path::is_within(key, prefix))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, keeping modification times and pending deltas
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn record_mtime(&mut self, path: &str, mtime: SystemTime) {
        self.mtimes.insert(path.to_string(), mtime);
    }

    pub fn mtime(&self, path: &str) -> Option<SystemTime> {
        self.mtimes.get(path).copied()
    }

    pub fn forget_mtime(&mut self, path: &str) -> Option<SystemTime> {
        self.mtimes.remove(path)
    }

    /// Whether a local path has ever been mapped
    pub fn is_known(&self, path: &str) -> bool {
        self.mtimes.contains_key(path)
    }

    /// Known local paths equal to `path` or beneath it
    pub fn known_under(&self, path: &str) -> Vec<String> {
        self.mtimes
            .keys()
            .filter(|known| crate::path::is_within(known, path))
            .cloned()
            .collect()
    }

    pub fn deltas(&self) -> &DeltaBuckets {
        &self.deltas
    }

    pub fn deltas_mut(&mut self) -> &mut DeltaBuckets {
        &mut self.deltas
    }

    /// Drain one audience's bucket
    pub fn drain(&mut self, audience: Audience) -> DeltaBucket {
        self.deltas.drain(audience)
    }
}
