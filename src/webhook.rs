//! # Webhook Notifier
//!
//! Fans connection changes out to the automation webhook. Delivery is
//! fire-and-forget: callers hand an event to [`EventSink::notify`] and move on.
//! Each event is POSTed once; failures are logged and counted, never retried
//! and never surfaced to the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;

pub const SIGNATURE_HEADER: &str = "X-Postwave-Signature";
const MAX_URL_LEN: usize = 2048;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Manual (API-key) connection
    PlatformConnected,
    PlatformConnectedOauth,
    PlatformDisconnected,
    /// Full list of connected platforms, sent on request
    DashboardSync,
}

/// A connection-state change for the automation system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_platforms: Option<Vec<String>>,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    fn for_platform(event_type: EventType, user_email: &str, user_id: Uuid, platform: &str) -> Self {
        Self {
            user_email: user_email.to_string(),
            user_id: Some(user_id),
            platform: Some(platform.to_string()),
            connected_platforms: None,
            event_type,
            timestamp: Utc::now(),
        }
    }

    pub fn platform_connected(user_email: &str, user_id: Uuid, platform: &str) -> Self {
        Self::for_platform(EventType::PlatformConnected, user_email, user_id, platform)
    }

    pub fn platform_connected_oauth(user_email: &str, user_id: Uuid, platform: &str) -> Self {
        Self::for_platform(EventType::PlatformConnectedOauth, user_email, user_id, platform)
    }

    pub fn platform_disconnected(user_email: &str, user_id: Uuid, platform: &str) -> Self {
        Self::for_platform(EventType::PlatformDisconnected, user_email, user_id, platform)
    }

    pub fn dashboard_sync(user_email: &str, user_id: Uuid, connected: Vec<String>) -> Self {
        Self {
            user_email: user_email.to_string(),
            user_id: Some(user_id),
            platform: None,
            connected_platforms: Some(connected),
            event_type: EventType::DashboardSync,
            timestamp: Utc::now(),
        }
    }
}

/// Wire body: the event plus the `source` tag.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    event: &'a WebhookEvent,
    source: &'a str,
}

/// Receives connection events. Implementations must not block the caller.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: WebhookEvent);
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("no webhook url configured")]
    Disabled,
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to sign webhook payload")]
    Signing,
    #[error("failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("webhook returned status {status}")]
    Status { status: u16 },
}

/// Delivery settings derived from configuration.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: Option<String>,
    pub signing_secret: Option<String>,
    pub timeout: Duration,
    pub source: String,
    pub allow_http: bool,
}

impl WebhookSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            url: config.webhook_url.clone(),
            signing_secret: config.webhook_signing_secret.clone(),
            timeout: Duration::from_secs(config.webhook_timeout_seconds),
            source: config.webhook_source.clone(),
            allow_http: config.allow_insecure_urls,
        }
    }
}

/// HTTP implementation of [`EventSink`].
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    settings: Arc<WebhookSettings>,
}

impl WebhookNotifier {
    pub fn new(settings: WebhookSettings) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(WebhookError::Client)?;

        Ok(Self {
            client,
            settings: Arc::new(settings),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.url.is_some()
    }

    /// Sends one event and waits for the response.
    pub async fn deliver(&self, event: &WebhookEvent) -> Result<(), WebhookError> {
        let target = self.settings.url.as_deref().ok_or(WebhookError::Disabled)?;
        self.validate_webhook_url(target)?;

        let body = serde_json::to_vec(&WebhookPayload {
            event,
            source: &self.settings.source,
        })?;

        let mut request = self
            .client
            .post(target)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = self.settings.signing_secret.as_deref() {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(WebhookError::Transport)?;

        let status = response.status();
        if status.is_success() {
            info!(
                event_type = ?event.event_type,
                target = %redacted_target(target),
                "Webhook delivered"
            );
            Ok(())
        } else {
            Err(WebhookError::Status {
                status: status.as_u16(),
            })
        }
    }

    /// Must be HTTPS (HTTP only when explicitly allowed) and at most 2048 characters.
    fn validate_webhook_url(&self, webhook_url: &str) -> Result<(), WebhookError> {
        if webhook_url.len() > MAX_URL_LEN {
            return Err(WebhookError::InvalidUrl(format!(
                "{} exceeds {} characters",
                redacted_target(webhook_url),
                MAX_URL_LEN
            )));
        }

        let parsed = Url::parse(webhook_url)
            .map_err(|_| WebhookError::InvalidUrl(redacted_target(webhook_url)))?;
        match parsed.scheme() {
            "https" => Ok(()),
            "http" if self.settings.allow_http => Ok(()),
            _ => Err(WebhookError::InvalidUrl(format!(
                "{} is not https",
                redacted_target(webhook_url)
            ))),
        }
    }
}

impl EventSink for WebhookNotifier {
    fn notify(&self, event: WebhookEvent) {
        if !self.is_enabled() {
            debug!(event_type = ?event.event_type, "Webhook disabled, dropping event");
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(event_type = ?event.event_type, "No async runtime, dropping webhook event");
            return;
        };

        let notifier = self.clone();
        handle.spawn(async move {
            let outcome = match notifier.deliver(&event).await {
                Ok(()) => "delivered",
                Err(error) => {
                    warn!(
                        event_type = ?event.event_type,
                        target = %notifier.settings.url.as_deref().map(redacted_target).unwrap_or_default(),
                        error = %error,
                        "Webhook delivery failed"
                    );
                    "failed"
                }
            };
            metrics::counter!("postwave_webhook_deliveries_total", "outcome" => outcome).increment(1);
        });
    }
}

/// `sha256=<hex hmac>` of the request body.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::Signing)?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// `scheme://host` of a URL, for logs.
fn redacted_target(webhook_url: &str) -> String {
    Url::parse(webhook_url)
        .ok()
        .map(|parsed| {
            let scheme = parsed.scheme();
            let host = parsed.host_str().unwrap_or("unknown");
            format!("{}://{}", scheme, host)
        })
        .unwrap_or_else(|| "[invalid-url]".to_string())
}
