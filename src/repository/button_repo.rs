//! Button Repository
//!
//! Typed access to `profile_buttons` (and the click log) on top of any
//! [`RemoteStore`].

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::error::{StoreError, StoreResult};
use super::traits::{Filter, Order, RemoteStore, Repository, Row};
use super::{BUTTONS_TABLE, CLICKS_TABLE, PROFILES_TABLE};
use crate::domain::{ButtonClick, ProfileButton};

/// Store-backed repository for profile buttons
#[derive(Clone)]
pub struct ButtonRepository {
    store: Arc<dyn RemoteStore>,
}

impl ButtonRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Record one press of a public button
    pub async fn record_click(&self, button: &ProfileButton) -> StoreResult<()> {
        let row = to_row(&ButtonClick::for_button(button))?;
        self.store.insert(CLICKS_TABLE, row).await?;
        Ok(())
    }

    /// Owner of a profile: `None` when the profile does not exist,
    /// `Some(None)` when it has not been claimed by a user
    pub async fn profile_owner(&self, profile_id: &str) -> StoreResult<Option<Option<String>>> {
        let rows = self
            .store
            .select(PROFILES_TABLE, &Filter::new().eq("id", profile_id), None)
            .await?;
        Ok(rows.into_iter().next().map(|row| match row.get("user_id") {
            Some(Value::String(user_id)) => Some(user_id.clone()),
            _ => None,
        }))
    }
}

#[async_trait]
impl Repository<ProfileButton> for ButtonRepository {
    async fn create(&self, entity: &ProfileButton) -> StoreResult<ProfileButton> {
        let row = self.store.insert(BUTTONS_TABLE, button_to_row(entity)?).await?;
        row_to_button(row)
    }

    async fn find_by_id(&self, id: &String) -> StoreResult<Option<ProfileButton>> {
        let rows = self
            .store
            .select(BUTTONS_TABLE, &Filter::new().eq("id", id.as_str()), None)
            .await?;
        rows.into_iter().next().map(row_to_button).transpose()
    }

    async fn list_by_parent(&self, parent_id: &str) -> StoreResult<Vec<ProfileButton>> {
        let rows = self
            .store
            .select(
                BUTTONS_TABLE,
                &Filter::new().eq("profile_id", parent_id),
                Some(&Order::asc("sort_order")),
            )
            .await?;
        rows.into_iter().map(row_to_button).collect()
    }

    async fn delete(&self, id: &String) -> StoreResult<()> {
        self.store
            .delete(BUTTONS_TABLE, &Filter::new().eq("id", id.as_str()))
            .await
    }

    async fn save_all(&self, entities: &[ProfileButton]) -> StoreResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let rows = entities.iter().map(button_to_row).collect::<StoreResult<Vec<_>>>()?;
        self.store.upsert(BUTTONS_TABLE, rows).await
    }
}

fn to_row<T: serde::Serialize>(value: &T) -> StoreResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected an object, got {}", other))),
    }
}

/// Convert a button to a full row; unsaved buttons leave `id` to the store
fn button_to_row(button: &ProfileButton) -> StoreResult<Row> {
    let mut row = to_row(button)?;
    if !button.is_persisted() {
        row.remove("id");
    }
    Ok(row)
}

/// Convert a store row to a button
fn row_to_button(row: Row) -> StoreResult<ProfileButton> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| StoreError::Decode(format!("profile_buttons row: {}", e)))
}
