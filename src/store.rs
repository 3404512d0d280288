//! Connection store
//!
//! Presents the two connection origins (OAuth handshakes and manually entered
//! API keys) as one set of platform connections per user. Reads merge both
//! origins by [`PlatformKey`]; disconnect clears both in one transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::crypto::CryptoKey;
use crate::models::oauth_state::PendingAuthorization;
use crate::platforms::{PlatformDefinition, PlatformKey, default_platforms, resolve_provider};
use crate::repositories::oauth_connection::OAuthConnectionInput;
use crate::repositories::{
    ApiKeyConnectionRepository, OAuthConnectionRepository, OAuthStateRepository,
    PlatformRepository, UpsertChange,
};

/// Storage path a connection came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[serde(rename = "oauth")]
    OAuth,
    ApiKey,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::OAuth => "oauth",
            Origin::ApiKey => "api_key",
        }
    }
}

/// Credentials written by [`ConnectionStore::connect`].
#[derive(Debug, Clone)]
pub enum ConnectionCredentials {
    OAuth {
        provider: String,
        access_token: String,
        refresh_token: Option<String>,
        external_user_id: Option<String>,
        profile_data: Option<JsonValue>,
    },
    ApiKey {
        api_key: String,
        api_secret: Option<String>,
    },
}

impl ConnectionCredentials {
    pub fn origin(&self) -> Origin {
        match self {
            ConnectionCredentials::OAuth { .. } => Origin::OAuth,
            ConnectionCredentials::ApiKey { .. } => Origin::ApiKey,
        }
    }
}

/// One platform as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlatformView {
    pub name: String,
    pub icon_ref: String,
    pub color_tag: String,
    pub is_connected: bool,
    /// Origins holding a record for this platform
    pub origins: Vec<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_data: Option<JsonValue>,
    /// Forwarded to trusted callers only; never rendered.
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(skip)]
    pub refresh_token: Option<String>,
}

impl PlatformView {
    fn disconnected(definition: &PlatformDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            icon_ref: definition.icon_ref.clone(),
            color_tag: definition.color_tag.clone(),
            is_connected: false,
            origins: Vec::new(),
            external_user_id: None,
            profile_data: None,
            access_token: None,
            refresh_token: None,
        }
    }
}

/// Merged connection state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlatformListing {
    pub platforms: Vec<PlatformView>,
    /// Origins that could not be read; their connections are missing from the listing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_origins: Vec<Origin>,
}

impl PlatformListing {
    /// The all-disconnected view of a catalog.
    pub fn disconnected(catalog: &[PlatformDefinition]) -> Self {
        Self {
            platforms: catalog.iter().map(PlatformView::disconnected).collect(),
            degraded_origins: Vec::new(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&PlatformView> {
        let key = PlatformKey::new(name)?;
        self.platforms
            .iter()
            .find(|p| PlatformKey::new(&p.name).as_ref() == Some(&key))
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.find(name).is_some_and(|p| p.is_connected)
    }

    /// Names of connected platforms, in listing order
    pub fn connected_names(&self) -> Vec<String> {
        self.platforms
            .iter()
            .filter(|p| p.is_connected)
            .map(|p| p.name.clone())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid connection request: {0}")]
    Validation(String),
    #[error("failed to read connections: {0}")]
    Read(#[source] anyhow::Error),
    #[error("failed to write connections: {0}")]
    Write(#[source] anyhow::Error),
}

/// Persistence for platform connections.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Platforms offered to users, in display order.
    async fn catalog(&self) -> Vec<PlatformDefinition> {
        default_platforms()
    }

    /// Catalog entries merged with the user's connections from both origins.
    async fn list_connections(&self, user_id: Uuid) -> Result<PlatformListing, StoreError>;

    /// Upserts the user's connection for `platform_name` in the credentials' origin.
    async fn connect(
        &self,
        user_id: Uuid,
        platform_name: &str,
        credentials: ConnectionCredentials,
    ) -> Result<UpsertChange, StoreError>;

    /// Removes the platform from both origins. Succeeds when nothing was stored.
    async fn disconnect(&self, user_id: Uuid, platform_name: &str) -> Result<(), StoreError>;

    /// Remembers that the user was sent to `provider` for `platform_name`,
    /// replacing an earlier pending redirect to the same provider.
    async fn record_pending_authorization(
        &self,
        user_id: Uuid,
        platform_name: &str,
        provider: &str,
    ) -> Result<PendingAuthorization, StoreError>;

    /// Consumes the newest unexpired pending authorization for `(user_id, provider)`.
    async fn take_pending_authorization(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<Option<PendingAuthorization>, StoreError>;

    /// Platform name of an existing OAuth connection made through `provider`.
    async fn find_oauth_platform(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<Option<String>, StoreError>;
}

/// [`ConnectionStore`] over the SeaORM tables.
#[derive(Clone)]
pub struct SeaOrmConnectionStore {
    db: Arc<DatabaseConnection>,
    oauth: OAuthConnectionRepository,
    api_keys: ApiKeyConnectionRepository,
    platforms: PlatformRepository,
    state_ttl_minutes: i64,
}

impl SeaOrmConnectionStore {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey, state_ttl_minutes: u64) -> Self {
        Self {
            oauth: OAuthConnectionRepository::new(db.clone(), crypto_key.clone()),
            api_keys: ApiKeyConnectionRepository::new(db.clone(), crypto_key),
            platforms: PlatformRepository::new(db.clone()),
            db,
            state_ttl_minutes: i64::try_from(state_ttl_minutes).unwrap_or(15),
        }
    }

    async fn load_catalog(&self) -> Vec<PlatformDefinition> {
        match self.platforms.list_definitions().await {
            Ok(definitions) if !definitions.is_empty() => definitions,
            Ok(_) => default_platforms(),
            Err(error) => {
                tracing::warn!(error = %error, "Platform catalog unreadable, using built-in catalog");
                default_platforms()
            }
        }
    }

    async fn read_oauth(&self, user_id: Uuid) -> anyhow::Result<Vec<ConnectedRecord>> {
        let rows = self.oauth.find_by_user(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let tokens = match self.oauth.decrypt_tokens(&row) {
                    Ok(tokens) => tokens,
                    Err(error) => {
                        tracing::warn!(
                            user_id = %row.user_id,
                            platform_key = %row.platform_key,
                            error = %error,
                            "Omitting undecryptable tokens from listing"
                        );
                        Default::default()
                    }
                };
                ConnectedRecord {
                    key: row.platform_key,
                    name: row.platform_name,
                    origin: Origin::OAuth,
                    external_user_id: row.external_user_id,
                    profile_data: row.profile_data,
                    access_token: tokens.access_token,
                    refresh_token: tokens.refresh_token,
                }
            })
            .collect())
    }

    async fn read_api_keys(&self, user_id: Uuid) -> anyhow::Result<Vec<ConnectedRecord>> {
        let rows = self.api_keys.find_by_user(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| ConnectedRecord {
                key: row.platform_key,
                name: row.platform_name,
                origin: Origin::ApiKey,
                external_user_id: None,
                profile_data: None,
                access_token: None,
                refresh_token: None,
            })
            .collect())
    }
}

/// A stored connection from either origin, before merging.
#[derive(Debug, Clone)]
struct ConnectedRecord {
    key: String,
    name: String,
    origin: Origin,
    external_user_id: Option<String>,
    profile_data: Option<JsonValue>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Folds connected records into the catalog view.
///
/// OAuth records win for every optional field. Records whose key matches no
/// catalog entry are appended once each, named after their first record.
fn merge_listing(
    catalog: &[PlatformDefinition],
    records: Vec<ConnectedRecord>,
    degraded_origins: Vec<Origin>,
) -> PlatformListing {
    let mut by_key: BTreeMap<String, Vec<ConnectedRecord>> = BTreeMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for record in records {
        if !by_key.contains_key(&record.key) {
            first_seen.push(record.key.clone());
        }
        by_key.entry(record.key.clone()).or_default().push(record);
    }

    let mut platforms = Vec::with_capacity(catalog.len());
    for definition in catalog {
        let mut view = PlatformView::disconnected(definition);
        if let Some(key) = definition.key()
            && let Some(records) = by_key.remove(key.as_str())
        {
            apply_records(&mut view, records);
        }
        platforms.push(view);
    }

    for key in first_seen {
        if let Some(records) = by_key.remove(&key) {
            let name = records
                .iter()
                .find(|r| r.origin == Origin::OAuth)
                .unwrap_or(&records[0])
                .name
                .clone();
            let mut view = PlatformView::disconnected(&PlatformDefinition {
                name,
                icon_ref: String::new(),
                color_tag: String::new(),
            });
            apply_records(&mut view, records);
            platforms.push(view);
        }
    }

    PlatformListing {
        platforms,
        degraded_origins,
    }
}

fn apply_records(view: &mut PlatformView, mut records: Vec<ConnectedRecord>) {
    records.sort_by_key(|r| r.origin);
    view.is_connected = !records.is_empty();
    for record in records {
        if !view.origins.contains(&record.origin) {
            view.origins.push(record.origin);
        }
        view.external_user_id = view.external_user_id.take().or(record.external_user_id);
        view.profile_data = view.profile_data.take().or(record.profile_data);
        view.access_token = view.access_token.take().or(record.access_token);
        view.refresh_token = view.refresh_token.take().or(record.refresh_token);
    }
}

fn require_key(platform_name: &str) -> Result<PlatformKey, StoreError> {
    PlatformKey::new(platform_name)
        .ok_or_else(|| StoreError::Validation("platform name must not be blank".to_string()))
}

#[async_trait]
impl ConnectionStore for SeaOrmConnectionStore {
    async fn catalog(&self) -> Vec<PlatformDefinition> {
        self.load_catalog().await
    }

    async fn list_connections(&self, user_id: Uuid) -> Result<PlatformListing, StoreError> {
        let catalog = self.load_catalog().await;
        let (oauth, api_keys) = tokio::join!(self.read_oauth(user_id), self.read_api_keys(user_id));

        let mut records = Vec::new();
        let mut degraded = Vec::new();
        for (origin, result) in [(Origin::OAuth, oauth), (Origin::ApiKey, api_keys)] {
            match result {
                Ok(found) => records.extend(found),
                Err(error) => {
                    tracing::warn!(
                        user_id = %user_id,
                        origin = origin.as_str(),
                        error = %error,
                        "Connection origin unreadable, listing without it"
                    );
                    metrics::counter!("postwave_connection_read_failures_total", "origin" => origin.as_str())
                        .increment(1);
                    degraded.push(origin);
                }
            }
        }

        Ok(merge_listing(&catalog, records, degraded))
    }

    async fn connect(
        &self,
        user_id: Uuid,
        platform_name: &str,
        credentials: ConnectionCredentials,
    ) -> Result<UpsertChange, StoreError> {
        let key = require_key(platform_name)?;
        let origin = credentials.origin();

        let change = match credentials {
            ConnectionCredentials::OAuth {
                provider,
                access_token,
                refresh_token,
                external_user_id,
                profile_data,
            } => {
                let (_, change) = self
                    .oauth
                    .upsert(OAuthConnectionInput {
                        user_id,
                        platform_name,
                        provider: &provider,
                        external_user_id: external_user_id.as_deref(),
                        access_token: &access_token,
                        refresh_token: refresh_token.as_deref(),
                        profile_data,
                    })
                    .await
                    .map_err(StoreError::Write)?;
                change
            }
            ConnectionCredentials::ApiKey {
                api_key,
                api_secret,
            } => {
                if api_key.trim().is_empty() {
                    return Err(StoreError::Validation("api key must not be empty".to_string()));
                }
                let (_, change) = self
                    .api_keys
                    .upsert(user_id, platform_name, &api_key, api_secret.as_deref())
                    .await
                    .map_err(StoreError::Write)?;
                change
            }
        };

        tracing::info!(
            user_id = %user_id,
            platform_key = %key,
            origin = origin.as_str(),
            change = ?change,
            "Connection stored"
        );
        if change.is_write() {
            metrics::counter!("postwave_connections_written_total", "origin" => origin.as_str())
                .increment(1);
        }
        Ok(change)
    }

    async fn disconnect(&self, user_id: Uuid, platform_name: &str) -> Result<(), StoreError> {
        let key = require_key(platform_name)?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| StoreError::Write(e.into()))?;
        let oauth_removed =
            OAuthConnectionRepository::delete_by_user_and_platform(&txn, user_id, &key)
                .await
                .map_err(|e| StoreError::Write(e.into()))?;
        let api_key_removed =
            ApiKeyConnectionRepository::delete_by_user_and_platform(&txn, user_id, &key)
                .await
                .map_err(|e| StoreError::Write(e.into()))?;
        txn.commit().await.map_err(|e| StoreError::Write(e.into()))?;

        tracing::info!(
            user_id = %user_id,
            platform_key = %key,
            oauth_removed,
            api_key_removed,
            "Connection removed"
        );
        Ok(())
    }

    async fn record_pending_authorization(
        &self,
        user_id: Uuid,
        platform_name: &str,
        provider: &str,
    ) -> Result<PendingAuthorization, StoreError> {
        require_key(platform_name)?;
        let repo = OAuthStateRepository::new(self.db.clone());
        let state = repo
            .replace(user_id, platform_name.trim(), provider, self.state_ttl_minutes)
            .await
            .map_err(|e| StoreError::Write(e.into()))?;
        Ok(state.into())
    }

    async fn take_pending_authorization(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<Option<PendingAuthorization>, StoreError> {
        let repo = OAuthStateRepository::new(self.db.clone());
        let state = repo
            .take_latest(user_id, provider)
            .await
            .map_err(|e| StoreError::Read(e.into()))?;
        Ok(state.map(Into::into))
    }

    async fn find_oauth_platform(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<Option<String>, StoreError> {
        let row = self
            .oauth
            .find_latest_by_user_and_provider(user_id, provider)
            .await
            .map_err(StoreError::Read)?;
        // Only trust rows whose platform actually logs in through this provider.
        Ok(row
            .map(|r| r.platform_name)
            .filter(|name| resolve_provider(name).is_some_and(|p| p.as_str() == provider)))
    }
}
