//! Domain-level errors surfaced by the button synchronizer.

use thiserror::Error;

/// Common result type for synchronizer operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures a caller of the synchronizer can observe.
///
/// Every variant carries a human readable message; callers branch on the
/// variant, never on the text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Caller lacks the role required for an elevated operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Target item or profile is absent at mutation time
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote call failed, timed out, or returned something undecodable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Reorder input is not a permutation of the current collection
    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),

    /// Request violates the button model (empty label, empty value, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
