//! Button Synchronizer
//!
//! Keeps the client-visible button list of each profile in step with the
//! remote store:
//! - fetch: replace the cached list with the authoritative one
//! - append: write first, then mark cached lists stale
//! - delete: optimistic removal, exact rollback on failure
//! - reorder: validate, one batched upsert, then replace the cache
//!
//! Mutations of one profile are serialized; every remote call is bounded by
//! the configured request timeout.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use super::cache::{CacheKey, Snapshot, SnapshotCache};
use super::ordering;
use crate::domain::{AccessMode, NewButton, ProfileButton, Role, SyncError, SyncResult};
use crate::notify::{Notification, NotificationSink};
use crate::repository::{AccessControl, ButtonRepository, RemoteStore, Repository, StoreError, StoreResult};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for [`ButtonSynchronizer`]
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound for any single store or access-control call
    pub request_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

struct Shared {
    repo: ButtonRepository,
    access: Arc<dyn AccessControl>,
    sink: Arc<dyn NotificationSink>,
    cache: SnapshotCache,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    options: SyncOptions,
}

/// Ordered collection synchronizer for profile buttons.
///
/// A handle is bound to one [`AccessMode`]; handles made with
/// [`with_mode`](Self::with_mode) share the cache and the per-profile locks.
#[derive(Clone)]
pub struct ButtonSynchronizer {
    shared: Arc<Shared>,
    mode: AccessMode,
}

impl ButtonSynchronizer {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        access: Arc<dyn AccessControl>,
        sink: Arc<dyn NotificationSink>,
        options: SyncOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                repo: ButtonRepository::new(store),
                access,
                sink,
                cache: SnapshotCache::new(),
                locks: StdMutex::new(HashMap::new()),
                options,
            }),
            mode: AccessMode::Owner,
        }
    }

    /// Same synchronizer, viewed in another access mode
    pub fn with_mode(&self, mode: AccessMode) -> Self {
        Self {
            shared: self.shared.clone(),
            mode,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.shared.cache
    }

    fn key(&self, parent_id: &str) -> CacheKey {
        CacheKey::new(parent_id, self.mode)
    }

    /// The list currently visible for `parent_id` in this mode
    pub fn snapshot(&self, parent_id: &str) -> Option<Snapshot> {
        self.shared.cache.get(&self.key(parent_id))
    }

    /// Follow every list published for `parent_id` in this mode
    pub fn subscribe(&self, parent_id: &str) -> watch::Receiver<Option<Snapshot>> {
        self.shared.cache.subscribe(self.key(parent_id))
    }

    /// All buttons of `parent_id`, ascending by position
    pub async fn fetch(&self, parent_id: &str) -> SyncResult<Snapshot> {
        let result = self.fetch_inner(parent_id).await;
        self.report(result, None, "Failed to load buttons")
    }

    /// Add a button at the end of the list
    pub async fn append(&self, parent_id: &str, button: NewButton) -> SyncResult<ProfileButton> {
        let result = self.append_inner(parent_id, button).await;
        self.report(result, Some("Button added successfully!"), "Failed to add button")
    }

    /// Remove a button, optimistically
    pub async fn delete(&self, item_id: &str) -> SyncResult<()> {
        let result = self.delete_inner(item_id).await;
        self.report(result, Some("Button deleted successfully!"), "Failed to delete button")
    }

    /// Persist a new order; `new_sequence` must hold every button of the profile
    pub async fn reorder(&self, parent_id: &str, new_sequence: Vec<ProfileButton>) -> SyncResult<()> {
        let result = self.reorder_inner(parent_id, new_sequence).await;
        self.report(result, Some("Buttons reordered successfully!"), "Failed to reorder buttons")
    }

    /// Drag policy: move the button at rank `from` to rank `to`
    pub async fn move_rank(&self, parent_id: &str, from: usize, to: usize) -> SyncResult<()> {
        if from == to {
            return Ok(());
        }
        let result = self.move_rank_inner(parent_id, from, to).await;
        self.report(result, Some("Buttons reordered successfully!"), "Failed to reorder buttons")
    }

    /// Drag end over another button: `active_id` takes the rank of `over_id`
    pub async fn move_item(&self, parent_id: &str, active_id: &str, over_id: &str) -> SyncResult<()> {
        if active_id == over_id {
            return Ok(());
        }
        let result = self.move_item_inner(parent_id, active_id, over_id).await;
        self.report(result, Some("Buttons reordered successfully!"), "Failed to reorder buttons")
    }

    /// Renumber stored positions to `0..n` if they have drifted.
    ///
    /// Returns the number of buttons in the list.
    pub async fn repair_positions(&self, parent_id: &str) -> SyncResult<usize> {
        let result = self.repair_inner(parent_id).await;
        self.report(
            result,
            Some("Profile buttons cleaned up successfully!"),
            "Failed to clean up profile buttons",
        )
    }

    /// Log a press of a public button; never touches the cache
    pub async fn record_click(&self, button: &ProfileButton) -> SyncResult<()> {
        let result = self.bounded(self.shared.repo.record_click(button)).await;
        if let Err(err) = &result {
            log::error!("Error recording click on {}: {}", button.id, err);
        }
        result
    }

    async fn fetch_inner(&self, parent_id: &str) -> SyncResult<Snapshot> {
        self.authorize().await?;
        let _guard = self.lock_parent(parent_id).await;

        let items = self.bounded(self.shared.repo.list_by_parent(parent_id)).await?;
        log::debug!("fetched {} buttons for {} ({:?})", items.len(), parent_id, self.mode);
        Ok(self.shared.cache.replace(self.key(parent_id), items))
    }

    async fn append_inner(&self, parent_id: &str, button: NewButton) -> SyncResult<ProfileButton> {
        let button = button.normalized()?;
        self.authorize().await?;
        let _guard = self.lock_parent(parent_id).await;

        let existing = self.bounded(self.shared.repo.list_by_parent(parent_id)).await?;
        if !ordering::is_contiguous(&existing) {
            log::warn!("positions of {} have gaps, compacting before append", parent_id);
            let compacted = ordering::compact(existing.clone());
            self.bounded(self.shared.repo.save_all(&compacted)).await?;
            self.shared.cache.invalidate_parent(parent_id);
        }

        let draft = ProfileButton::draft(parent_id, button, existing.len() as i32);
        let created = self.bounded(self.shared.repo.create(&draft)).await?;
        self.shared.cache.invalidate_parent(parent_id);
        log::info!("added button {} to {} at {}", created.id, parent_id, created.position);
        Ok(created)
    }

    async fn delete_inner(&self, item_id: &str) -> SyncResult<()> {
        self.authorize().await?;
        let key = match self.shared.cache.find_key(self.mode, item_id) {
            Some(key) => key,
            None => {
                let button = self
                    .bounded(self.shared.repo.find_by_id(&item_id.to_string()))
                    .await?
                    .ok_or_else(|| SyncError::NotFound(format!("button {}", item_id)))?;
                self.key(&button.parent_id)
            }
        };
        let _guard = self.lock_parent(&key.parent_id).await;

        let token = self.shared.cache.begin(&key, |items| {
            items.iter().filter(|b| b.id != item_id).cloned().collect()
        });

        match self.bounded(self.shared.repo.delete(&item_id.to_string())).await {
            Ok(()) => {
                if let Some(token) = token {
                    self.shared.cache.commit(token);
                }
                self.shared.cache.invalidate_siblings(&key);
                log::info!("deleted button {} from {}", item_id, key.parent_id);
                Ok(())
            }
            Err(err) => {
                if let Some(token) = token {
                    self.shared.cache.rollback(token);
                }
                Err(err)
            }
        }
    }

    async fn reorder_inner(&self, parent_id: &str, new_sequence: Vec<ProfileButton>) -> SyncResult<()> {
        self.authorize().await?;
        let _guard = self.lock_parent(parent_id).await;

        let current = self.bounded(self.shared.repo.list_by_parent(parent_id)).await?;
        ordering::validate_permutation(&current, &new_sequence)?;

        // Whole rows are written, so every other column comes from the
        // authoritative copy
        let by_id: HashMap<&str, &ProfileButton> = current.iter().map(|b| (b.id.as_str(), b)).collect();
        let reordered: Vec<ProfileButton> = new_sequence
            .iter()
            .filter_map(|b| by_id.get(b.id.as_str()).map(|stored| (*stored).clone()))
            .collect();
        let reordered = ordering::renumber(reordered);

        self.bounded(self.shared.repo.save_all(&reordered)).await?;

        let key = self.key(parent_id);
        self.shared.cache.replace(key.clone(), reordered);
        self.shared.cache.invalidate_siblings(&key);
        Ok(())
    }

    async fn move_rank_inner(&self, parent_id: &str, from: usize, to: usize) -> SyncResult<()> {
        let snapshot = self.current(parent_id).await?;
        let moved = ordering::move_rank(&snapshot, from, to).ok_or_else(|| {
            SyncError::InvalidPermutation(format!(
                "cannot move rank {} to {} in a list of {}",
                from,
                to,
                snapshot.len()
            ))
        })?;
        self.reorder_inner(parent_id, moved).await
    }

    async fn move_item_inner(&self, parent_id: &str, active_id: &str, over_id: &str) -> SyncResult<()> {
        let snapshot = self.current(parent_id).await?;
        let rank_of = |id: &str| {
            snapshot
                .iter()
                .position(|b| b.id == id)
                .ok_or_else(|| SyncError::NotFound(format!("button {} in {}", id, parent_id)))
        };
        let from = rank_of(active_id)?;
        let to = rank_of(over_id)?;
        self.move_rank_inner(parent_id, from, to).await
    }

    async fn repair_inner(&self, parent_id: &str) -> SyncResult<usize> {
        self.authorize_repair(parent_id).await?;
        let _guard = self.lock_parent(parent_id).await;

        let current = self.bounded(self.shared.repo.list_by_parent(parent_id)).await?;
        let compacted = ordering::compact(current.clone());
        if compacted != current {
            log::info!("renumbering {} buttons of {}", compacted.len(), parent_id);
            self.bounded(self.shared.repo.save_all(&compacted)).await?;
        }

        let count = compacted.len();
        let key = self.key(parent_id);
        self.shared.cache.replace(key.clone(), compacted);
        self.shared.cache.invalidate_siblings(&key);
        Ok(count)
    }

    /// Fresh cached list, fetching when there is none
    async fn current(&self, parent_id: &str) -> SyncResult<Snapshot> {
        match self.shared.cache.get_fresh(&self.key(parent_id)) {
            Some(snapshot) => Ok(snapshot),
            None => self.fetch_inner(parent_id).await,
        }
    }

    /// Elevated handles must belong to an admin; owner handles pass
    async fn authorize(&self) -> SyncResult<()> {
        if !self.mode.is_elevated() {
            return Ok(());
        }
        let identity = self.identity().await?;
        let role = self
            .bounded(self.shared.access.role_of(&identity))
            .await
            .map_err(|e| SyncError::PermissionDenied(format!("role lookup failed: {}", e)))?;
        match role {
            Some(Role::Admin) => Ok(()),
            _ => Err(SyncError::PermissionDenied("insufficient permissions".to_string())),
        }
    }

    /// Repairs are allowed to admins, or to the owner of the profile
    async fn authorize_repair(&self, parent_id: &str) -> SyncResult<()> {
        if self.mode.is_elevated() {
            return self.authorize().await;
        }
        let identity = self.identity().await?;
        match self.bounded(self.shared.repo.profile_owner(parent_id)).await? {
            None => Err(SyncError::NotFound(format!("profile {}", parent_id))),
            Some(Some(owner)) if owner == identity.user_id => Ok(()),
            Some(_) => Err(SyncError::PermissionDenied(
                "unauthorized to modify this profile".to_string(),
            )),
        }
    }

    async fn identity(&self) -> SyncResult<crate::domain::Identity> {
        self.bounded(self.shared.access.current_identity())
            .await
            .map_err(|e| SyncError::PermissionDenied(format!("identity lookup failed: {}", e)))?
            .ok_or_else(|| SyncError::PermissionDenied("not authenticated".to_string()))
    }

    async fn lock_parent(&self, parent_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.shared.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(parent_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn bounded<T, F>(&self, request: F) -> SyncResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let timeout = self.shared.options.request_timeout;
        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(StoreError::Timeout(timeout).into()),
        }
    }

    fn report<T>(&self, result: SyncResult<T>, success: Option<&str>, failure: &str) -> SyncResult<T> {
        match &result {
            Ok(_) => {
                if let Some(message) = success {
                    self.shared.sink.notify(Notification::success(message));
                }
            }
            Err(err) => self
                .shared
                .sink
                .notify(Notification::error(format!("{}: {}", failure, err))),
        }
        result
    }
}
