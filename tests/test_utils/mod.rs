//! Shared fixtures for integration tests.
//!
//! In-memory SQLite with migrations applied, a fixed crypto key, and an
//! [`EventSink`] that records events instead of sending them.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use postwave::config::AppConfig;
use postwave::crypto::CryptoKey;
use postwave::models::oauth_state;
use postwave::redirect::IdentityProviderRedirector;
use postwave::store::SeaOrmConnectionStore;
use postwave::webhook::{EventSink, EventType, WebhookEvent};
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
    Statement,
};

pub const TEST_API_TOKEN: &str = "test-api-token";
pub const AUTH_BASE: &str = "https://auth.example.com/auth/v1";
pub const RETURN_URL: &str = "https://app.example.com/dashboard";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(vec![42u8; 32]).expect("32-byte key")
}

pub fn test_store(db: &DatabaseConnection) -> Arc<SeaOrmConnectionStore> {
    Arc::new(SeaOrmConnectionStore::new(
        Arc::new(db.clone()),
        test_crypto_key(),
        15,
    ))
}

pub fn test_redirector() -> Arc<IdentityProviderRedirector> {
    Arc::new(IdentityProviderRedirector::new(AUTH_BASE, RETURN_URL))
}

pub fn test_config() -> AppConfig {
    AppConfig {
        api_tokens: vec![TEST_API_TOKEN.to_string()],
        crypto_key: Some(vec![42u8; 32]),
        identity_auth_base: AUTH_BASE.to_string(),
        oauth_return_url: RETURN_URL.to_string(),
        ..AppConfig::default()
    }
}

/// Drops a table so reads against it fail, simulating an unreachable origin.
pub async fn break_table(db: &DatabaseConnection, table: &str) -> Result<()> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        format!("DROP TABLE {}", table),
    ))
    .await?;
    Ok(())
}

/// Pending authorization rows currently stored for a user.
pub async fn pending_states(
    db: &DatabaseConnection,
    user_id: uuid::Uuid,
) -> Result<Vec<oauth_state::Model>> {
    Ok(oauth_state::Entity::find()
        .filter(oauth_state::Column::UserId.eq(user_id))
        .all(db)
        .await?)
}

/// Writes a pending authorization that expired an hour ago.
pub async fn insert_expired_state(
    db: &DatabaseConnection,
    user_id: uuid::Uuid,
    platform_name: &str,
    provider: &str,
) -> Result<()> {
    let created = chrono::Utc::now() - chrono::Duration::hours(2);
    let am = oauth_state::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        user_id: Set(user_id),
        platform_name: Set(platform_name.to_string()),
        provider: Set(provider.to_string()),
        expires_at: Set((created + chrono::Duration::hours(1)).into()),
        created_at: Set(created.into()),
    };
    oauth_state::Entity::insert(am)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Collects events in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<WebhookEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<WebhookEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_type(&self, event_type: EventType) -> Vec<WebhookEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: WebhookEvent) {
        self.events.lock().unwrap().push(event);
    }
}
