//! Commands for profile button management
//!
//! Every command takes an `admin` flag choosing the access mode.

use crate::domain::{AccessMode, ActionKind, NewButton, ProfileButton};
use crate::AppState;

/// List the buttons of a profile, in display order
pub async fn list_buttons(state: &AppState, profile_id: &str, admin: bool) -> Result<Vec<ProfileButton>, String> {
    let sync = state.sync.with_mode(AccessMode::from_admin_flag(admin));
    let snapshot = sync.fetch(profile_id).await.map_err(|e| e.to_string())?;
    Ok(snapshot.to_vec())
}

/// Add a button at the end of a profile's list
pub async fn add_button(
    state: &AppState,
    profile_id: &str,
    label: String,
    action_type: &str,
    action_value: String,
    admin: bool,
) -> Result<ProfileButton, String> {
    let action_kind = action_type.parse::<ActionKind>().map_err(|e| e.to_string())?;
    let sync = state.sync.with_mode(AccessMode::from_admin_flag(admin));
    sync.append(profile_id, NewButton::new(label, action_kind, action_value))
        .await
        .map_err(|e| e.to_string())
}

/// Delete a button by id
pub async fn delete_button(state: &AppState, button_id: &str, admin: bool) -> Result<(), String> {
    let sync = state.sync.with_mode(AccessMode::from_admin_flag(admin));
    sync.delete(button_id).await.map_err(|e| e.to_string())
}

/// Reorder a profile's buttons; `ids` lists every button id in the new order
pub async fn reorder_buttons(
    state: &AppState,
    profile_id: &str,
    ids: Vec<String>,
    admin: bool,
) -> Result<Vec<ProfileButton>, String> {
    let sync = state.sync.with_mode(AccessMode::from_admin_flag(admin));
    let current = sync.fetch(profile_id).await.map_err(|e| e.to_string())?;

    // Unknown ids stop here; duplicates are left to the permutation check
    let proposed: Vec<ProfileButton> = ids
        .iter()
        .filter_map(|id| current.iter().find(|b| &b.id == id).cloned())
        .collect();
    if proposed.len() != ids.len() {
        return Err(format!(
            "invalid reorder: {} of {} ids belong to profile {}",
            proposed.len(),
            ids.len(),
            profile_id
        ));
    }

    sync.reorder(profile_id, proposed).await.map_err(|e| e.to_string())?;
    Ok(sync.snapshot(profile_id).map(|s| s.to_vec()).unwrap_or_default())
}

/// Drag a button from one rank to another
pub async fn move_button(
    state: &AppState,
    profile_id: &str,
    from: usize,
    to: usize,
    admin: bool,
) -> Result<Vec<ProfileButton>, String> {
    let sync = state.sync.with_mode(AccessMode::from_admin_flag(admin));
    sync.move_rank(profile_id, from, to).await.map_err(|e| e.to_string())?;
    match sync.snapshot(profile_id) {
        Some(snapshot) => Ok(snapshot.to_vec()),
        None => list_buttons(state, profile_id, admin).await,
    }
}

/// Renumber a profile's stored positions; returns the button count
pub async fn repair_buttons(state: &AppState, profile_id: &str, admin: bool) -> Result<usize, String> {
    let sync = state.sync.with_mode(AccessMode::from_admin_flag(admin));
    sync.repair_positions(profile_id).await.map_err(|e| e.to_string())
}

/// Record a press and return where the button leads
pub async fn click_button(state: &AppState, profile_id: &str, button_id: &str) -> Result<String, String> {
    let buttons = list_buttons(state, profile_id, false).await?;
    let button = buttons
        .iter()
        .find(|b| b.id == button_id)
        .ok_or_else(|| format!("button {} not found in profile {}", button_id, profile_id))?;

    // A lost click must not keep the visitor from the target
    if let Err(e) = state.sync.record_click(button).await {
        log::warn!("click on {} not recorded: {}", button_id, e);
    }
    Ok(button.action_target())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogSink;
    use crate::repository::{MemoryStore, RemoteStore, Row, StoreAccess, BUTTONS_TABLE, CLICKS_TABLE};
    use crate::sync::{ButtonSynchronizer, SyncOptions};
    use serde_json::json;
    use std::sync::Arc;

    fn state_with(store: Arc<MemoryStore>) -> AppState {
        let access = Arc::new(StoreAccess::new(store.clone(), None));
        AppState {
            sync: ButtonSynchronizer::new(store, access, Arc::new(LogSink), SyncOptions::default()),
        }
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let rows: Vec<Row> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                json!({
                    "id": id,
                    "profile_id": "p1",
                    "label": id,
                    "action_type": "email",
                    "action_value": format!("{}@example.com", id),
                    "sort_order": i,
                })
                .as_object()
                .cloned()
                .unwrap()
            })
            .collect();
        store.seed(BUTTONS_TABLE, rows).await;
        store
    }

    fn ids(buttons: &[ProfileButton]) -> Vec<&str> {
        buttons.iter().map(|b| b.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let state = state_with(Arc::new(MemoryStore::new()));

        add_button(&state, "p1", "Site".into(), "link", "example.com".into(), false)
            .await
            .unwrap();
        let listed = list_buttons(&state, "p1", false).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].action_value, "https://example.com");
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_action_type() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let err = add_button(&state, "p1", "X".into(), "fax", "1".into(), false)
            .await
            .unwrap_err();
        assert!(err.contains("fax"));
    }

    #[tokio::test]
    async fn test_reorder_by_ids() {
        let state = state_with(seeded().await);

        let ordered = reorder_buttons(&state, "p1", vec!["c".into(), "a".into(), "b".into()], false)
            .await
            .unwrap();

        assert_eq!(ids(&ordered), vec!["c", "a", "b"]);
        assert!(reorder_buttons(&state, "p1", vec!["c".into(), "zzz".into(), "b".into()], false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_move_and_delete() {
        let state = state_with(seeded().await);

        let moved = move_button(&state, "p1", 2, 0, false).await.unwrap();
        assert_eq!(ids(&moved), vec!["c", "a", "b"]);

        delete_button(&state, "a", false).await.unwrap();
        assert_eq!(ids(&list_buttons(&state, "p1", false).await.unwrap()), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_admin_without_identity_is_denied() {
        let state = state_with(seeded().await);
        assert!(list_buttons(&state, "p1", true).await.is_err());
    }

    #[tokio::test]
    async fn test_click_returns_target() {
        let store = seeded().await;
        let state = state_with(store.clone());

        let target = click_button(&state, "p1", "b").await.unwrap();

        assert_eq!(target, "mailto:b@example.com");
        assert_eq!(store.rows(CLICKS_TABLE).await.len(), 1);
        assert!(store
            .select(CLICKS_TABLE, &crate::repository::Filter::new().eq("button_id", "b"), None)
            .await
            .map(|rows| rows.len() == 1)
            .unwrap());
    }
}
