//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer depends on nothing but serde and thiserror.

mod access;
mod button;
mod entity;
mod error;

pub use access::{AccessMode, Identity, Role};
pub use button::{ActionKind, ButtonClick, NewButton, ProfileButton, GOOGLE_REVIEW_URL};
pub use entity::Entity;
pub use error::{SyncError, SyncResult};
