//! Remote store errors

use std::time::Duration;
use thiserror::Error;

use crate::domain::SyncError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised at the remote store boundary
#[derive(Error, Debug)]
pub enum StoreError {
    /// A filtered write matched no row
    #[error("no matching row in {table}")]
    NotFound { table: String },

    /// The backend answered with a non-success status
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request did not complete in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A row could not be mapped onto a domain type
    #[error("invalid row: {0}")]
    Decode(String),

    /// SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => SyncError::NotFound(err.to_string()),
            other => SyncError::StoreUnavailable(other.to_string()),
        }
    }
}
