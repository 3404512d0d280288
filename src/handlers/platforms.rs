//! # Platform Handlers
//!
//! Listing, toggling and syncing a user's platform connections.

use axum::{
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{CurrentUser, UserHeaders};
use crate::controller::{ActionOutcome, ApiKeyCredentials, PlatformAction};
use crate::error::ApiError;
use crate::server::AppState;
use crate::store::PlatformListing;

/// Body of a platform toggle
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PlatformActionRequest {
    /// Connection state shown to the user when they clicked
    pub is_connected: bool,
    /// Manually entered API key, for platforms without OAuth
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncResponse {
    /// Names sent to the automation webhook
    pub connected_platforms: Vec<String>,
    pub listing: PlatformListing,
}

/// Lists the catalog with the user's connection state.
///
/// Anonymous callers get every platform disconnected.
#[utoipa::path(
    get,
    path = "/platforms",
    security(("bearer_auth" = [])),
    params(UserHeaders),
    responses(
        (status = 200, description = "Platform catalog with connection state", body = PlatformListing),
        (status = 400, description = "Malformed user headers", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "platforms"
)]
pub async fn list_platforms(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<PlatformListing>, ApiError> {
    let listing = match user.user() {
        Some(user) => state.store.list_connections(user.id).await?,
        None => PlatformListing::disconnected(&state.store.catalog().await),
    };
    Ok(Json(listing))
}

/// Connects or disconnects one platform.
#[utoipa::path(
    post,
    path = "/platforms/{name}/action",
    security(("bearer_auth" = [])),
    params(
        ("name" = String, Path, description = "Platform display name, e.g. \"YouTube\""),
        UserHeaders
    ),
    request_body = PlatformActionRequest,
    responses(
        (status = 200, description = "What the toggle did", body = ActionOutcome, example = json!({
            "outcome": "redirecting",
            "platform": "Facebook",
            "provider": "facebook",
            "authorize_url": "https://auth.example.com/auth/v1/authorize?provider=facebook&redirect_to=https%3A%2F%2Fapp.example.com%2Fdashboard"
        })),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Not signed in or invalid bearer token", body = ApiError),
        (status = 500, description = "Connection update failed", body = ApiError)
    ),
    tag = "platforms"
)]
pub async fn platform_action(
    State(state): State<AppState>,
    user: CurrentUser,
    name: Result<Path<String>, PathRejection>,
    payload: Result<Json<PlatformActionRequest>, JsonRejection>,
) -> Result<Json<ActionOutcome>, ApiError> {
    let Path(name) = name?;
    let Json(request) = payload?;

    let credentials = request.api_key.map(|api_key| ApiKeyCredentials {
        api_key,
        api_secret: request.api_secret,
    });

    let outcome = state
        .controller
        .handle_platform_action(
            user.user(),
            &PlatformAction {
                name,
                is_connected: request.is_connected,
            },
            credentials,
        )
        .await?;

    Ok(Json(outcome))
}

/// Sends the connected platform list to the automation webhook.
#[utoipa::path(
    post,
    path = "/platforms/sync",
    security(("bearer_auth" = [])),
    params(UserHeaders),
    responses(
        (status = 200, description = "Sync event queued", body = SyncResponse),
        (status = 401, description = "Not signed in or invalid bearer token", body = ApiError)
    ),
    tag = "platforms"
)]
pub async fn sync_platforms(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SyncResponse>, ApiError> {
    let listing = state.controller.sync_dashboard(user.user()).await?;
    Ok(Json(SyncResponse {
        connected_platforms: listing.connected_names(),
        listing,
    }))
}
