//! # Tests for Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

use super::platforms::list_platforms;
use super::{healthz, root};
use crate::auth::CurrentUser;
use crate::config::AppConfig;
use crate::controller::AuthenticatedUser;
use crate::crypto::CryptoKey;
use crate::redirect::IdentityProviderRedirector;
use crate::server::AppState;
use crate::store::SeaOrmConnectionStore;
use crate::webhook::{EventSink, WebhookEvent};

struct DiscardEvents;

impl EventSink for DiscardEvents {
    fn notify(&self, _event: WebhookEvent) {}
}

async fn test_state() -> AppState {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let store = Arc::new(SeaOrmConnectionStore::new(
        Arc::new(db.clone()),
        CryptoKey::new(vec![7u8; 32]).unwrap(),
        15,
    ));
    AppState::new(
        Arc::new(AppConfig::default()),
        db,
        store,
        Arc::new(IdentityProviderRedirector::new(
            "https://auth.example.com",
            "https://app.example.com",
        )),
        Arc::new(DiscardEvents),
        None,
    )
}

#[tokio::test]
async fn root_returns_service_info() {
    let Json(info) = root().await;
    assert_eq!(info.service, "postwave");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn healthz_reports_ok_with_reachable_database() {
    let (status, Json(body)) = healthz(State(test_state().await)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, "ok");
}

#[tokio::test]
async fn anonymous_listing_shows_catalog_disconnected() {
    let state = test_state().await;
    let Json(listing) = list_platforms(State(state), CurrentUser(None)).await.unwrap();

    assert_eq!(listing.platforms.len(), 6);
    assert!(listing.platforms.iter().all(|p| !p.is_connected));
    assert!(listing.degraded_origins.is_empty());
}

#[tokio::test]
async fn signed_in_listing_without_connections_is_disconnected() {
    let state = test_state().await;
    let user = AuthenticatedUser {
        id: uuid::Uuid::new_v4(),
        email: "sam@example.com".to_string(),
    };
    let Json(listing) = list_platforms(State(state), CurrentUser(Some(user)))
        .await
        .unwrap();

    assert_eq!(listing.platforms[0].name, "YouTube");
    assert!(listing.connected_names().is_empty());
}
