//! Role lookup over the `user_roles` table.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::error::{StoreError, StoreResult};
use super::traits::{AccessControl, Filter, RemoteStore};
use super::ROLES_TABLE;
use crate::domain::{Identity, Role};

/// Role assigned to `identity`, read from `user_roles`
pub async fn role_from_store(store: &dyn RemoteStore, identity: &Identity) -> StoreResult<Option<Role>> {
    let rows = store
        .select(ROLES_TABLE, &Filter::new().eq("user_id", identity.user_id.as_str()), None)
        .await?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    match row.get("role") {
        None | Some(Value::Null) => Ok(None),
        Some(role) => serde_json::from_value(role.clone())
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("user_roles.role: {}", e))),
    }
}

/// Access control for backends without an auth service: the identity is
/// fixed at construction, the role still comes from the store
pub struct StoreAccess {
    store: Arc<dyn RemoteStore>,
    identity: Option<Identity>,
}

impl StoreAccess {
    pub fn new(store: Arc<dyn RemoteStore>, identity: Option<Identity>) -> Self {
        Self { store, identity }
    }
}

#[async_trait]
impl AccessControl for StoreAccess {
    async fn current_identity(&self) -> StoreResult<Option<Identity>> {
        Ok(self.identity.clone())
    }

    async fn role_of(&self, identity: &Identity) -> StoreResult<Option<Role>> {
        role_from_store(self.store.as_ref(), identity).await
    }
}
