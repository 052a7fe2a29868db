//! Identities, roles and access modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated caller as reported by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id)
    }
}

/// Application role stored in `user_roles`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Which view of a profile's buttons is being worked with.
///
/// The admin panel and the owner's own page cache independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Owner,
    Elevated,
}

impl AccessMode {
    pub fn from_admin_flag(admin: bool) -> Self {
        if admin {
            AccessMode::Elevated
        } else {
            AccessMode::Owner
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, AccessMode::Elevated)
    }
}
