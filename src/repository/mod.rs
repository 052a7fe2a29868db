//! Repository Layer
//!
//! Data access abstractions and implementations.

mod access;
mod button_repo;
mod error;
mod memory;
mod rest;
mod sqlite;
mod traits;

#[cfg(test)]
mod tests;

pub use access::{role_from_store, StoreAccess};
pub use button_repo::ButtonRepository;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, StoreOp};
pub use rest::{RestStore, SessionAccess};
pub use sqlite::SqliteStore;
pub use traits::{AccessControl, Filter, Order, RemoteStore, Repository, Row};

pub const BUTTONS_TABLE: &str = "profile_buttons";
pub const CLICKS_TABLE: &str = "profile_button_clicks";
pub const PROFILES_TABLE: &str = "nfc_profiles";
pub const ROLES_TABLE: &str = "user_roles";
