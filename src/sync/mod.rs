//! Sync Layer
//!
//! Snapshot cache, ordering rules and the synchronizer that keeps the cache
//! consistent with the remote store.

mod cache;
mod ordering;
mod synchronizer;
mod transaction;


pub use cache::{CacheKey, Snapshot, SnapshotCache};
pub use ordering::{compact, is_contiguous, move_rank, renumber, validate_permutation};
pub use synchronizer::{ButtonSynchronizer, SyncOptions, DEFAULT_REQUEST_TIMEOUT};
pub use transaction::RollbackToken;
