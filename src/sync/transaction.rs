//! Optimistic cache transactions
//!
//! `begin` publishes a patched snapshot and hands back a token holding the
//! snapshot it replaced. The caller settles the token with `commit` once the
//! remote write succeeded, or `rollback` when it failed.

use super::cache::{CacheKey, Snapshot, SnapshotCache};
use crate::domain::ProfileButton;

/// Proof of an applied optimistic patch and the way back
#[must_use = "an optimistic patch must be committed or rolled back"]
#[derive(Debug)]
pub struct RollbackToken {
    key: CacheKey,
    previous: Snapshot,
    previous_stale: bool,
    applied: Snapshot,
}

impl RollbackToken {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Snapshot that was visible before the patch
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Snapshot published by the patch
    pub fn applied(&self) -> &Snapshot {
        &self.applied
    }
}

impl SnapshotCache {
    /// Start an optimistic mutation. `None` when nothing is cached under
    /// `key`, in which case there is nothing to patch or restore.
    pub fn begin<F>(&self, key: &CacheKey, patch: F) -> Option<RollbackToken>
    where
        F: FnOnce(&[ProfileButton]) -> Vec<ProfileButton>,
    {
        let previous_stale = self.stale_flag(key);
        let (previous, applied) = self.patch(key, patch)?;
        Some(RollbackToken {
            key: key.clone(),
            previous,
            previous_stale,
            applied,
        })
    }

    /// The remote write succeeded; the patched snapshot stands
    pub fn commit(&self, token: RollbackToken) {
        log::debug!(
            "optimistic patch on {} ({:?}) confirmed, {} items",
            token.key.parent_id,
            token.key.mode,
            token.applied.len()
        );
    }

    /// The remote write failed; publish the captured snapshot again
    pub fn rollback(&self, token: RollbackToken) {
        log::debug!(
            "rolling back optimistic patch on {} ({:?})",
            token.key.parent_id,
            token.key.mode
        );
        self.restore(&token.key, token.previous, token.previous_stale);
    }
}
