//! OAuth return handling.
//!
//! After the identity provider sends the user back, the session carries the
//! provider's access and refresh tokens. [`OAuthReturnHandler::handle`] turns
//! that into a stored OAuth connection and notifies the automation webhook.
//! It runs on every dashboard load, so it must be safe to call repeatedly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::platforms::ProviderId;
use crate::repositories::UpsertChange;
use crate::store::{ConnectionCredentials, ConnectionStore, PlatformListing, StoreError};
use crate::webhook::{EventSink, WebhookEvent};

/// Provider reported when the session carries tokens but no provider name.
pub const UNKNOWN_PROVIDER: &str = "unknown";

/// Snapshot of the authenticated session after an OAuth return.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub provider_token: Option<String>,
    #[serde(default)]
    pub provider_refresh_token: Option<String>,
    /// Provider recorded in the session's app metadata
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<JsonValue>,
}

impl AuthSession {
    /// Both provider tokens are present only right after a completed handshake.
    fn handshake_tokens(&self) -> Option<(&str, &str)> {
        let access = self.provider_token.as_deref().filter(|t| !t.is_empty())?;
        let refresh = self
            .provider_refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())?;
        Some((access, refresh))
    }

    fn provider_name(&self) -> &str {
        self.provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(UNKNOWN_PROVIDER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReturnOutcome {
    /// The session holds no fresh handshake.
    NoHandshake,
    Recorded {
        platform: String,
        provider: String,
        change: UpsertChange,
        listing: PlatformListing,
    },
}

pub struct OAuthReturnHandler {
    store: Arc<dyn ConnectionStore>,
    events: Arc<dyn EventSink>,
}

impl OAuthReturnHandler {
    pub fn new(store: Arc<dyn ConnectionStore>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    pub async fn handle(&self, session: &AuthSession) -> Result<ReturnOutcome, StoreError> {
        let Some((access_token, refresh_token)) = session.handshake_tokens() else {
            return Ok(ReturnOutcome::NoHandshake);
        };

        let provider = session.provider_name().to_string();
        if provider == UNKNOWN_PROVIDER {
            tracing::warn!(user_id = %session.user_id, "OAuth return without provider metadata");
        } else if provider.parse::<ProviderId>().is_err() {
            tracing::warn!(user_id = %session.user_id, provider = %provider, "OAuth return from unrecognized provider");
        }

        let platform = self.platform_for(session.user_id, &provider).await;

        let change = self
            .store
            .connect(
                session.user_id,
                &platform,
                ConnectionCredentials::OAuth {
                    provider: provider.clone(),
                    access_token: access_token.to_string(),
                    refresh_token: Some(refresh_token.to_string()),
                    external_user_id: Some(session.user_id.to_string()),
                    profile_data: session.user_metadata.clone(),
                },
            )
            .await?;

        if change.is_write() {
            self.events.notify(WebhookEvent::platform_connected_oauth(
                &session.email,
                session.user_id,
                &platform,
            ));
        } else {
            tracing::debug!(
                user_id = %session.user_id,
                platform = %platform,
                "OAuth return repeated an existing connection"
            );
        }

        let listing = self.store.list_connections(session.user_id).await?;

        Ok(ReturnOutcome::Recorded {
            platform,
            provider,
            change,
            listing,
        })
    }

    /// Pending redirect first, then an existing connection made through the
    /// same provider, then the provider id itself.
    async fn platform_for(&self, user_id: Uuid, provider: &str) -> String {
        match self.store.take_pending_authorization(user_id, provider).await {
            Ok(Some(pending)) => return pending.platform_name,
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(user_id = %user_id, error = %error, "Pending authorization lookup failed");
            }
        }

        match self.store.find_oauth_platform(user_id, provider).await {
            Ok(Some(platform)) => return platform,
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(user_id = %user_id, error = %error, "Existing connection lookup failed");
            }
        }

        provider.to_string()
    }
}
