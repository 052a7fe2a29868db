//! Repository Integration Tests
//!
//! Tests for ButtonRepository with in-memory SQLite database.

#[cfg(test)]
mod tests {
    use crate::domain::{ActionKind, Identity, NewButton, ProfileButton, Role};
    use crate::repository::{
        AccessControl, ButtonRepository, Filter, RemoteStore, Repository, Row, SqliteStore, StoreAccess,
        StoreError, BUTTONS_TABLE, CLICKS_TABLE, PROFILES_TABLE, ROLES_TABLE,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn setup_test_db() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open_in_memory().expect("Failed to init test DB"))
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn draft(label: &str, position: i32) -> ProfileButton {
        ProfileButton::draft(
            "profile-1",
            NewButton::new(label, ActionKind::Link, format!("https://{}.example", label)),
            position,
        )
    }

    #[tokio::test]
    async fn test_create_button() {
        let repo = ButtonRepository::new(setup_test_db());

        let created = repo.create(&draft("Site", 0)).await.expect("Failed to create");

        assert!(created.is_persisted());
        assert_eq!(created.label, "Site");
        assert_eq!(created.parent_id, "profile-1");
        assert!(created.created_at.is_some());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let repo = ButtonRepository::new(setup_test_db());
        let created = repo.create(&draft("Find me", 0)).await.unwrap();

        let found = repo.find_by_id(&created.id).await.expect("Find failed");
        assert_eq!(found.map(|b| b.label), Some("Find me".to_string()));

        let missing = repo.find_by_id(&"nope".to_string()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_by_parent_is_ordered() {
        let repo = ButtonRepository::new(setup_test_db());
        repo.create(&draft("Second", 1)).await.unwrap();
        repo.create(&draft("First", 0)).await.unwrap();
        let mut other = draft("Elsewhere", 0);
        other.parent_id = "profile-2".to_string();
        repo.create(&other).await.unwrap();

        let buttons = repo.list_by_parent("profile-1").await.expect("List failed");
        let labels: Vec<&str> = buttons.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_delete_button() {
        let repo = ButtonRepository::new(setup_test_db());
        let created = repo.create(&draft("To delete", 0)).await.unwrap();

        repo.delete(&created.id).await.expect("Delete failed");
        assert!(repo.find_by_id(&created.id).await.unwrap().is_none());

        let again = repo.delete(&created.id).await.unwrap_err();
        assert!(matches!(again, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_save_all_rewrites_positions() {
        let repo = ButtonRepository::new(setup_test_db());
        let a = repo.create(&draft("A", 0)).await.unwrap();
        let b = repo.create(&draft("B", 1)).await.unwrap();

        let mut b0 = b.clone();
        b0.position = 0;
        let mut a1 = a.clone();
        a1.position = 1;
        repo.save_all(&[b0, a1]).await.expect("Save failed");

        let buttons = repo.list_by_parent("profile-1").await.unwrap();
        let ids: Vec<&str> = buttons.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);
        assert_eq!(buttons[0].created_at, b.created_at);
    }

    #[tokio::test]
    async fn test_action_kind_persistence() {
        let repo = ButtonRepository::new(setup_test_db());
        let mut review = draft("Review", 0);
        review.action_kind = ActionKind::GoogleReview;
        let created = repo.create(&review).await.unwrap();

        let found = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found.action_kind, ActionKind::GoogleReview);
    }

    #[tokio::test]
    async fn test_unknown_action_type_fails_to_decode() {
        let store = setup_test_db();
        store
            .insert(
                BUTTONS_TABLE,
                row(json!({
                    "profile_id": "profile-1",
                    "label": "Fax",
                    "action_type": "fax",
                    "action_value": "123",
                })),
            )
            .await
            .unwrap();

        let repo = ButtonRepository::new(store);
        let err = repo.list_by_parent("profile-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[tokio::test]
    async fn test_record_click() {
        let store = setup_test_db();
        let repo = ButtonRepository::new(store.clone());
        let button = repo.create(&draft("Site", 0)).await.unwrap();

        repo.record_click(&button).await.expect("Click failed");

        let clicks = store
            .select(CLICKS_TABLE, &Filter::new().eq("button_id", button.id.as_str()), None)
            .await
            .unwrap();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0]["profile_id"], "profile-1");
    }

    #[tokio::test]
    async fn test_clicks_follow_button_deletion() {
        let store = setup_test_db();
        let repo = ButtonRepository::new(store.clone());
        let button = repo.create(&draft("Site", 0)).await.unwrap();
        repo.record_click(&button).await.unwrap();

        repo.delete(&button.id).await.expect("Delete with clicks failed");

        let clicks = store.select(CLICKS_TABLE, &Filter::new(), None).await.unwrap();
        assert!(clicks.is_empty());
    }

    #[tokio::test]
    async fn test_update_patches_columns() {
        let store = setup_test_db();
        let repo = ButtonRepository::new(store.clone());
        let button = repo.create(&draft("Old", 0)).await.unwrap();

        store
            .update(
                BUTTONS_TABLE,
                &Filter::new().eq("id", button.id.as_str()),
                row(json!({ "label": "New" })),
            )
            .await
            .unwrap();

        let found = repo.find_by_id(&button.id).await.unwrap().unwrap();
        assert_eq!(found.label, "New");
        assert_eq!(found.action_value, button.action_value);
    }

    #[tokio::test]
    async fn test_profile_owner() {
        let store = setup_test_db();
        store
            .insert(PROFILES_TABLE, row(json!({ "id": "profile-1", "user_id": "user-1" })))
            .await
            .unwrap();
        store.insert(PROFILES_TABLE, row(json!({ "id": "profile-2" }))).await.unwrap();
        let repo = ButtonRepository::new(store);

        assert_eq!(repo.profile_owner("profile-1").await.unwrap(), Some(Some("user-1".to_string())));
        assert_eq!(repo.profile_owner("profile-2").await.unwrap(), Some(None));
        assert_eq!(repo.profile_owner("profile-3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_access_reads_role() {
        let store = setup_test_db();
        store
            .insert(ROLES_TABLE, row(json!({ "user_id": "admin-1", "role": "admin" })))
            .await
            .unwrap();
        let access = StoreAccess::new(store, Some(Identity::new("admin-1")));

        let identity = access.current_identity().await.unwrap().unwrap();
        assert_eq!(access.role_of(&identity).await.unwrap(), Some(Role::Admin));
        assert_eq!(access.role_of(&Identity::new("someone")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_identifiers() {
        let store = setup_test_db();
        let err = store
            .select("profile_buttons; DROP TABLE user_roles", &Filter::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Other(_)));
    }
}
