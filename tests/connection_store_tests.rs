use postwave::repositories::{ApiKeyConnectionRepository, UpsertChange};
use postwave::store::{ConnectionCredentials, ConnectionStore, Origin, StoreError};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

mod test_utils;
use test_utils::{
    break_table, insert_expired_state, pending_states, setup_test_db, test_crypto_key, test_store,
};

fn oauth(provider: &str, access: &str) -> ConnectionCredentials {
    ConnectionCredentials::OAuth {
        provider: provider.to_string(),
        access_token: access.to_string(),
        refresh_token: Some(format!("{}-refresh", access)),
        external_user_id: Some("ext-1".to_string()),
        profile_data: Some(json!({ "name": "Sam" })),
    }
}

fn api_key(key: &str) -> ConnectionCredentials {
    ConnectionCredentials::ApiKey {
        api_key: key.to_string(),
        api_secret: None,
    }
}

#[tokio::test]
async fn new_user_sees_catalog_disconnected() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);

    let listing = store.list_connections(Uuid::new_v4()).await.unwrap();

    let names: Vec<&str> = listing.platforms.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        ["YouTube", "Instagram", "TikTok", "Facebook", "Twitter/X", "LinkedIn"]
    );
    assert!(listing.platforms.iter().all(|p| !p.is_connected));
}

#[tokio::test]
async fn connect_is_visible_on_next_read() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    let change = store.connect(user, "TikTok", api_key("tk-123")).await.unwrap();
    assert_eq!(change, UpsertChange::Created);

    let listing = store.list_connections(user).await.unwrap();
    let tiktok = listing.find("TikTok").unwrap();
    assert!(tiktok.is_connected);
    assert_eq!(tiktok.origins, vec![Origin::ApiKey]);
}

#[tokio::test]
async fn platform_in_both_origins_is_listed_once() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store.connect(user, "YouTube", oauth("google", "yt-token")).await.unwrap();
    store.connect(user, "youtube", api_key("yt-key")).await.unwrap();

    let listing = store.list_connections(user).await.unwrap();
    let youtube: Vec<_> = listing
        .platforms
        .iter()
        .filter(|p| p.name.eq_ignore_ascii_case("youtube"))
        .collect();
    assert_eq!(youtube.len(), 1);
    assert_eq!(youtube[0].origins, vec![Origin::OAuth, Origin::ApiKey]);
    assert_eq!(youtube[0].external_user_id.as_deref(), Some("ext-1"));
    assert_eq!(youtube[0].access_token.as_deref(), Some("yt-token"));
    assert_eq!(listing.platforms.len(), 6);
}

#[tokio::test]
async fn platform_names_match_case_insensitively() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store.connect(user, "  LINKEDIN ", api_key("li")).await.unwrap();

    let listing = store.list_connections(user).await.unwrap();
    assert!(listing.is_connected("LinkedIn"));
    assert_eq!(listing.platforms.len(), 6);
}

#[tokio::test]
async fn disconnect_clears_both_origins() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store.connect(user, "Facebook", oauth("facebook", "fb")).await.unwrap();
    store.connect(user, "Facebook", api_key("fb-key")).await.unwrap();

    store.disconnect(user, "facebook").await.unwrap();

    let listing = store.list_connections(user).await.unwrap();
    assert!(!listing.is_connected("Facebook"));
    let find = store.find_oauth_platform(user, "facebook").await.unwrap();
    assert!(find.is_none());
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store.disconnect(user, "Instagram").await.unwrap();
    store.connect(user, "Instagram", api_key("ig")).await.unwrap();
    store.disconnect(user, "Instagram").await.unwrap();
    store.disconnect(user, "Instagram").await.unwrap();

    assert!(!store.list_connections(user).await.unwrap().is_connected("Instagram"));
}

#[tokio::test]
async fn disconnect_leaves_other_users_alone() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    store.connect(alice, "TikTok", api_key("a")).await.unwrap();
    store.connect(bob, "TikTok", api_key("b")).await.unwrap();
    store.disconnect(alice, "TikTok").await.unwrap();

    assert!(!store.list_connections(alice).await.unwrap().is_connected("TikTok"));
    assert!(store.list_connections(bob).await.unwrap().is_connected("TikTok"));
}

#[tokio::test]
async fn empty_api_key_is_rejected() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    let err = store.connect(user, "TikTok", api_key("   ")).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(!store.list_connections(user).await.unwrap().is_connected("TikTok"));
}

#[tokio::test]
async fn blank_platform_name_is_rejected() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);

    let err = store.disconnect(Uuid::new_v4(), " ").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
async fn repeated_oauth_upsert_reports_unchanged() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    let first = store.connect(user, "Facebook", oauth("facebook", "t1")).await.unwrap();
    let again = store.connect(user, "Facebook", oauth("facebook", "t1")).await.unwrap();
    let rotated = store.connect(user, "Facebook", oauth("facebook", "t2")).await.unwrap();

    assert_eq!(first, UpsertChange::Created);
    assert_eq!(again, UpsertChange::Unchanged);
    assert_eq!(rotated, UpsertChange::Updated);

    let listing = store.list_connections(user).await.unwrap();
    assert_eq!(listing.find("Facebook").unwrap().access_token.as_deref(), Some("t2"));
}

#[tokio::test]
async fn rotated_refresh_token_is_stored() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    let with_refresh = |refresh: &str| ConnectionCredentials::OAuth {
        provider: "google".to_string(),
        access_token: "same-access".to_string(),
        refresh_token: Some(refresh.to_string()),
        external_user_id: Some("ext-1".to_string()),
        profile_data: None,
    };

    store.connect(user, "YouTube", with_refresh("refresh-1")).await.unwrap();
    let change = store
        .connect(user, "YouTube", with_refresh("refresh-2"))
        .await
        .unwrap();

    assert_eq!(change, UpsertChange::Updated);
    let listing = store.list_connections(user).await.unwrap();
    assert_eq!(
        listing.find("YouTube").unwrap().refresh_token.as_deref(),
        Some("refresh-2")
    );
}

#[tokio::test]
async fn api_keys_are_encrypted_at_rest() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store
        .connect(
            user,
            "TikTok",
            ConnectionCredentials::ApiKey {
                api_key: "plain-key".to_string(),
                api_secret: Some("plain-secret".to_string()),
            },
        )
        .await
        .unwrap();

    let repo = ApiKeyConnectionRepository::new(Arc::new(db.clone()), test_crypto_key());
    let rows = repo.find_by_user(user).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_ne!(rows[0].api_key_ciphertext, b"plain-key".to_vec());

    let (key, secret) = repo.decrypt_credentials(&rows[0]).unwrap();
    assert_eq!(key, "plain-key");
    assert_eq!(secret.as_deref(), Some("plain-secret"));
}

#[tokio::test]
async fn uncatalogued_connection_is_appended() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store.connect(user, "google", oauth("google", "g")).await.unwrap();

    let listing = store.list_connections(user).await.unwrap();
    assert_eq!(listing.platforms.len(), 7);
    let last = listing.platforms.last().unwrap();
    assert_eq!(last.name, "google");
    assert!(last.is_connected);
}

#[tokio::test]
async fn unreadable_origin_degrades_listing() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store.connect(user, "Facebook", oauth("facebook", "fb")).await.unwrap();
    store.connect(user, "TikTok", api_key("tk")).await.unwrap();
    break_table(&db, "api_key_connections").await.unwrap();

    let listing = store.list_connections(user).await.unwrap();
    assert_eq!(listing.degraded_origins, vec![Origin::ApiKey]);
    assert!(listing.is_connected("Facebook"));
    assert!(!listing.is_connected("TikTok"));
}

#[tokio::test]
async fn both_origins_unreadable_yields_default_view() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    break_table(&db, "api_key_connections").await.unwrap();
    break_table(&db, "oauth_connections").await.unwrap();

    let listing = store.list_connections(Uuid::new_v4()).await.unwrap();
    assert_eq!(listing.degraded_origins, vec![Origin::OAuth, Origin::ApiKey]);
    assert_eq!(listing.platforms.len(), 6);
    assert!(listing.connected_names().is_empty());
}

#[tokio::test]
async fn pending_authorization_is_consumed_once() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store
        .record_pending_authorization(user, "YouTube", "google")
        .await
        .unwrap();

    let pending = store.take_pending_authorization(user, "google").await.unwrap();
    assert_eq!(pending.map(|p| p.platform_name).as_deref(), Some("YouTube"));
    assert!(store.take_pending_authorization(user, "google").await.unwrap().is_none());
}

#[tokio::test]
async fn newest_pending_authorization_wins() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    store
        .record_pending_authorization(user, "Facebook", "facebook")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .record_pending_authorization(user, "Instagram", "facebook")
        .await
        .unwrap();

    let pending = store.take_pending_authorization(user, "facebook").await.unwrap();
    assert_eq!(pending.unwrap().platform_name, "Instagram");
}

#[tokio::test]
async fn repeated_redirects_keep_one_pending_row() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    for _ in 0..5 {
        store
            .record_pending_authorization(user, "YouTube", "google")
            .await
            .unwrap();
    }
    store
        .record_pending_authorization(user, "Facebook", "facebook")
        .await
        .unwrap();

    let states = pending_states(&db, user).await.unwrap();
    assert_eq!(states.len(), 2);
    assert!(states.iter().any(|s| s.provider == "google" && s.platform_name == "YouTube"));
}

#[tokio::test]
async fn recording_a_redirect_purges_expired_rows() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let abandoned = Uuid::new_v4();
    let active = Uuid::new_v4();

    insert_expired_state(&db, abandoned, "LinkedIn", "linkedin_oidc")
        .await
        .unwrap();
    assert_eq!(pending_states(&db, abandoned).await.unwrap().len(), 1);

    store
        .record_pending_authorization(active, "YouTube", "google")
        .await
        .unwrap();

    assert!(pending_states(&db, abandoned).await.unwrap().is_empty());
    assert_eq!(pending_states(&db, active).await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_pending_authorization_is_not_used() {
    let db = setup_test_db().await.unwrap();
    let store = test_store(&db);
    let user = Uuid::new_v4();

    insert_expired_state(&db, user, "YouTube", "google").await.unwrap();

    let pending = store.take_pending_authorization(user, "google").await.unwrap();
    assert!(pending.is_none());
    assert!(pending_states(&db, user).await.unwrap().is_empty());
}
