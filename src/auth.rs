//! # Authentication
//!
//! The front end calls the API with a bearer service token and identifies the
//! signed-in user with `X-User-Id` / `X-User-Email` headers. The token is
//! checked by [`auth_middleware`]; the user headers are read by the
//! [`CurrentUser`] extractor. Requests without user headers are anonymous.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::controller::AuthenticatedUser;
use crate::error::{ApiError, unauthorized, validation_error};
use crate::server::AppState;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Rejects requests that do not carry one of the configured API tokens.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;
    validate_token(&config, token)?;
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

fn validate_token(config: &AppConfig, token: &str) -> Result<(), ApiError> {
    let is_valid = config
        .api_tokens
        .iter()
        .any(|configured| ConstantTimeEq::ct_eq(token.as_bytes(), configured.as_bytes()).into());

    if is_valid {
        Ok(())
    } else {
        Err(unauthorized(Some("Invalid bearer token")))
    }
}

/// The signed-in user, if the front end sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

impl CurrentUser {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.0.as_ref()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| {
                validation_error(
                    "Invalid user header",
                    serde_json::json!({ name: "Header must be valid UTF-8" }),
                )
            }),
    }
}

fn current_user_from_headers(headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let Some(raw_id) = header_str(headers, USER_ID_HEADER)? else {
        return Ok(CurrentUser(None));
    };

    let id = raw_id.parse::<Uuid>().map_err(|_| {
        validation_error(
            "Invalid user ID",
            serde_json::json!({ USER_ID_HEADER: "Must be a valid UUID" }),
        )
    })?;

    let email = header_str(headers, USER_EMAIL_HEADER)?.ok_or_else(|| {
        validation_error(
            "Missing required header",
            serde_json::json!({ USER_EMAIL_HEADER: "Required when X-User-Id is set" }),
        )
    })?;

    Ok(CurrentUser(Some(AuthenticatedUser {
        id,
        email: email.to_string(),
    })))
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user_from_headers(&parts.headers)
    }
}

/// OpenAPI header parameters identifying the signed-in user
#[derive(Debug, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Header)]
pub struct UserHeaders {
    /// Signed-in user id (UUID); omit for anonymous requests
    #[serde(rename = "X-User-Id")]
    #[param(rename = "X-User-Id", value_type = Option<String>)]
    pub user_id: Option<String>,
    /// Signed-in user email, required with `X-User-Id`
    #[serde(rename = "X-User-Email")]
    #[param(rename = "X-User-Email", value_type = Option<String>)]
    pub user_email: Option<String>,
}
