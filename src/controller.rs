//! Connection action controller.
//!
//! Decides what a click on a platform toggle does: disconnect a connected
//! platform, send the user to the identity provider, store manually entered
//! API keys, or ask for them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::platforms::{ProviderId, resolve_provider};
use crate::redirect::{OAuthRedirector, RedirectError};
use crate::store::{ConnectionCredentials, ConnectionStore, PlatformListing, StoreError};
use crate::webhook::{EventSink, WebhookEvent};

/// The signed-in user performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
}

/// The platform the user clicked, as currently displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlatformAction {
    pub name: String,
    pub is_connected: bool,
}

/// Manually entered credentials for platforms without OAuth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCredentials {
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Connected { platform: String },
    Disconnected { platform: String },
    /// The browser should follow `authorize_url`; nothing is stored yet.
    Redirecting {
        platform: String,
        provider: ProviderId,
        authorize_url: String,
    },
    /// The platform has no OAuth provider and no credentials were supplied.
    ManualSetupRequired { platform: String },
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("sign in required")]
    AuthRequired,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Redirect(#[from] RedirectError),
}

pub struct ConnectionController {
    store: Arc<dyn ConnectionStore>,
    redirector: Arc<dyn OAuthRedirector>,
    events: Arc<dyn EventSink>,
}

impl ConnectionController {
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        redirector: Arc<dyn OAuthRedirector>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            redirector,
            events,
        }
    }

    pub async fn handle_platform_action(
        &self,
        user: Option<&AuthenticatedUser>,
        action: &PlatformAction,
        credentials: Option<ApiKeyCredentials>,
    ) -> Result<ActionOutcome, ActionError> {
        let user = user.ok_or(ActionError::AuthRequired)?;
        let platform = action.name.clone();

        if action.is_connected {
            self.store.disconnect(user.id, &platform).await?;
            self.events.notify(WebhookEvent::platform_disconnected(
                &user.email,
                user.id,
                &platform,
            ));
            return Ok(ActionOutcome::Disconnected { platform });
        }

        if let Some(provider) = resolve_provider(&platform) {
            let authorize_url = self.redirector.authorize_url(provider)?;
            self.store
                .record_pending_authorization(user.id, &platform, provider.as_str())
                .await?;
            tracing::info!(
                user_id = %user.id,
                platform = %platform,
                provider = %provider,
                "Redirecting to identity provider"
            );
            return Ok(ActionOutcome::Redirecting {
                platform,
                provider,
                authorize_url: authorize_url.into(),
            });
        }

        let Some(credentials) = credentials else {
            return Ok(ActionOutcome::ManualSetupRequired { platform });
        };

        self.store
            .connect(
                user.id,
                &platform,
                ConnectionCredentials::ApiKey {
                    api_key: credentials.api_key,
                    api_secret: credentials.api_secret,
                },
            )
            .await?;
        self.events.notify(WebhookEvent::platform_connected(
            &user.email,
            user.id,
            &platform,
        ));
        Ok(ActionOutcome::Connected { platform })
    }

    /// Sends the user's connected platforms to the automation webhook.
    pub async fn sync_dashboard(
        &self,
        user: Option<&AuthenticatedUser>,
    ) -> Result<PlatformListing, ActionError> {
        let user = user.ok_or(ActionError::AuthRequired)?;
        let listing = self.store.list_connections(user.id).await?;
        self.events.notify(WebhookEvent::dashboard_sync(
            &user.email,
            user.id,
            listing.connected_names(),
        ));
        Ok(listing)
    }
}
