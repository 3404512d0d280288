//! OAuth return endpoint
//!
//! The front end posts its session snapshot on every dashboard load. A fresh
//! handshake is stored as an OAuth connection; anything else is a no-op.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use serde_json::json;

use crate::auth::{CurrentUser, UserHeaders};
use crate::error::{ApiError, validation_error};
use crate::oauth_return::{AuthSession, ReturnOutcome};
use crate::server::AppState;

#[utoipa::path(
    post,
    path = "/oauth/return",
    security(("bearer_auth" = [])),
    params(UserHeaders),
    request_body = AuthSession,
    responses(
        (status = 200, description = "Handshake recorded, or nothing to do", body = ReturnOutcome),
        (status = 400, description = "Session does not match the signed-in user", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 500, description = "Connection could not be stored", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn oauth_return(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<AuthSession>, JsonRejection>,
) -> Result<Json<ReturnOutcome>, ApiError> {
    let Json(session) = payload?;

    if let Some(user) = user.user()
        && user.id != session.user_id
    {
        return Err(validation_error(
            "Session belongs to a different user",
            json!({ "user_id": "Must match X-User-Id" }),
        ));
    }

    let outcome = state.oauth_return.handle(&session).await?;
    Ok(Json(outcome))
}
