//! Snapshot Cache
//!
//! Client-side belief about each button list, keyed by profile and access
//! mode. Snapshots are immutable `Arc`s, so a rollback can put back the very
//! snapshot that was visible before a mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::domain::{AccessMode, ProfileButton};

/// Published view of one button list
pub type Snapshot = Arc<Vec<ProfileButton>>;

/// Cache key: one list per profile and access mode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub parent_id: String,
    pub mode: AccessMode,
}

impl CacheKey {
    pub fn new(parent_id: impl Into<String>, mode: AccessMode) -> Self {
        Self {
            parent_id: parent_id.into(),
            mode,
        }
    }
}

struct Slot {
    snapshot: Option<Snapshot>,
    stale: bool,
    watchers: watch::Sender<Option<Snapshot>>,
}

impl Slot {
    fn empty() -> Self {
        let (watchers, _) = watch::channel(None);
        Self {
            snapshot: None,
            stale: true,
            watchers,
        }
    }

    fn publish(&mut self, snapshot: Option<Snapshot>, stale: bool) {
        self.snapshot = snapshot.clone();
        self.stale = stale;
        self.watchers.send_replace(snapshot);
    }
}

/// Map from [`CacheKey`] to the latest snapshot
#[derive(Default)]
pub struct SnapshotCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest snapshot, stale or not
    pub fn get(&self, key: &CacheKey) -> Option<Snapshot> {
        self.slots().get(key).and_then(|slot| slot.snapshot.clone())
    }

    /// Latest snapshot, unless it has been invalidated
    pub fn get_fresh(&self, key: &CacheKey) -> Option<Snapshot> {
        self.slots()
            .get(key)
            .filter(|slot| !slot.stale)
            .and_then(|slot| slot.snapshot.clone())
    }

    /// True when there is no snapshot or it must be refreshed before use
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.slots().get(key).map_or(true, |slot| slot.stale || slot.snapshot.is_none())
    }

    /// Replace the snapshot wholesale (after a fetch or a confirmed write)
    pub fn replace(&self, key: CacheKey, items: Vec<ProfileButton>) -> Snapshot {
        let snapshot = Arc::new(items);
        self.slots()
            .entry(key)
            .or_insert_with(Slot::empty)
            .publish(Some(snapshot.clone()), false);
        snapshot
    }

    /// Apply `f` to the current snapshot and publish the result.
    ///
    /// Returns `(previous, patched)`, or `None` when nothing is cached.
    pub fn patch<F>(&self, key: &CacheKey, f: F) -> Option<(Snapshot, Snapshot)>
    where
        F: FnOnce(&[ProfileButton]) -> Vec<ProfileButton>,
    {
        let mut slots = self.slots();
        let slot = slots.get_mut(key)?;
        let previous = slot.snapshot.clone()?;
        let patched = Arc::new(f(&previous));
        let stale = slot.stale;
        slot.publish(Some(patched.clone()), stale);
        Some((previous, patched))
    }

    /// Put back an earlier snapshot exactly as it was
    pub fn restore(&self, key: &CacheKey, snapshot: Snapshot, stale: bool) {
        self.slots()
            .entry(key.clone())
            .or_insert_with(Slot::empty)
            .publish(Some(snapshot), stale);
    }

    /// Mark one snapshot stale; it stays readable until refreshed
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(slot) = self.slots().get_mut(key) {
            slot.stale = true;
        }
    }

    /// Mark every snapshot of `parent_id` stale
    pub fn invalidate_parent(&self, parent_id: &str) {
        for (key, slot) in self.slots().iter_mut() {
            if key.parent_id == parent_id {
                slot.stale = true;
            }
        }
    }

    /// Mark every snapshot of the same parent stale, except `keep`
    pub fn invalidate_siblings(&self, keep: &CacheKey) {
        for (key, slot) in self.slots().iter_mut() {
            if key.parent_id == keep.parent_id && key != keep {
                slot.stale = true;
            }
        }
    }

    /// Drop a snapshot entirely; watchers see `None`
    pub fn discard(&self, key: &CacheKey) {
        if let Some(slot) = self.slots().get_mut(key) {
            slot.publish(None, true);
        }
    }

    /// Key of the snapshot in `mode` that currently shows `item_id`
    pub fn find_key(&self, mode: AccessMode, item_id: &str) -> Option<CacheKey> {
        self.slots()
            .iter()
            .filter(|(key, _)| key.mode == mode)
            .find(|(_, slot)| {
                slot.snapshot
                    .as_ref()
                    .is_some_and(|items| items.iter().any(|b| b.id == item_id))
            })
            .map(|(key, _)| key.clone())
    }

    pub(crate) fn stale_flag(&self, key: &CacheKey) -> bool {
        self.slots().get(key).map_or(true, |slot| slot.stale)
    }

    /// Receiver that yields every snapshot published under `key`
    pub fn subscribe(&self, key: CacheKey) -> watch::Receiver<Option<Snapshot>> {
        self.slots().entry(key).or_insert_with(Slot::empty).watchers.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionKind, NewButton};

    fn button(id: &str, position: i32) -> ProfileButton {
        let mut b = ProfileButton::draft("p1", NewButton::new(id, ActionKind::Link, "https://x.io"), position);
        b.id = id.to_string();
        b
    }

    fn key(mode: AccessMode) -> CacheKey {
        CacheKey::new("p1", mode)
    }

    #[test]
    fn test_replace_and_get() {
        let cache = SnapshotCache::new();
        assert!(cache.is_stale(&key(AccessMode::Owner)));

        cache.replace(key(AccessMode::Owner), vec![button("a", 0)]);
        assert!(!cache.is_stale(&key(AccessMode::Owner)));
        assert_eq!(cache.get_fresh(&key(AccessMode::Owner)).unwrap().len(), 1);
        assert!(cache.get(&key(AccessMode::Elevated)).is_none());
    }

    #[test]
    fn test_invalidate_keeps_snapshot_readable() {
        let cache = SnapshotCache::new();
        cache.replace(key(AccessMode::Owner), vec![button("a", 0)]);
        cache.invalidate(&key(AccessMode::Owner));

        assert!(cache.is_stale(&key(AccessMode::Owner)));
        assert!(cache.get_fresh(&key(AccessMode::Owner)).is_none());
        assert!(cache.get(&key(AccessMode::Owner)).is_some());
    }

    #[test]
    fn test_invalidate_siblings() {
        let cache = SnapshotCache::new();
        cache.replace(key(AccessMode::Owner), vec![button("a", 0)]);
        cache.replace(key(AccessMode::Elevated), vec![button("a", 0)]);
        cache.replace(CacheKey::new("p2", AccessMode::Owner), vec![]);

        cache.invalidate_siblings(&key(AccessMode::Owner));

        assert!(!cache.is_stale(&key(AccessMode::Owner)));
        assert!(cache.is_stale(&key(AccessMode::Elevated)));
        assert!(!cache.is_stale(&CacheKey::new("p2", AccessMode::Owner)));
    }

    #[test]
    fn test_patch_returns_previous() {
        let cache = SnapshotCache::new();
        let original = cache.replace(key(AccessMode::Owner), vec![button("a", 0), button("b", 1)]);

        let (previous, patched) = cache
            .patch(&key(AccessMode::Owner), |items| items.iter().filter(|b| b.id != "a").cloned().collect())
            .unwrap();

        assert!(Arc::ptr_eq(&previous, &original));
        assert_eq!(patched.len(), 1);
        assert!(cache.patch(&key(AccessMode::Elevated), |items| items.to_vec()).is_none());
    }

    #[test]
    fn test_find_key_respects_mode() {
        let cache = SnapshotCache::new();
        cache.replace(key(AccessMode::Elevated), vec![button("a", 0)]);

        assert_eq!(cache.find_key(AccessMode::Elevated, "a"), Some(key(AccessMode::Elevated)));
        assert_eq!(cache.find_key(AccessMode::Owner, "a"), None);
        assert_eq!(cache.find_key(AccessMode::Elevated, "zzz"), None);
    }

    #[test]
    fn test_subscribers_see_publications() {
        let cache = SnapshotCache::new();
        let mut rx = cache.subscribe(key(AccessMode::Owner));
        assert!(rx.borrow().is_none());

        cache.replace(key(AccessMode::Owner), vec![button("a", 0)]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().map(|s| s.len()), Some(1));

        cache.discard(&key(AccessMode::Owner));
        assert!(rx.borrow_and_update().is_none());
    }
}
