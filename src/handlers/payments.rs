//! # Payment Verification Handlers
//!
//! Thin forwarding layer over the external payment verification service.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::error::{ApiError, validation_error};
use crate::payments::{
    PaymentDetails, PaymentError, PaymentVerificationService, VerificationDecision,
    VerificationId,
};
use crate::server::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerificationResponse {
    pub verification_id: String,
    /// Set once the verification was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<VerificationDecision>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolveRequest {
    pub action: VerificationDecision,
}

fn payment_service(state: &AppState) -> Result<Arc<dyn PaymentVerificationService>, ApiError> {
    state
        .payments
        .clone()
        .ok_or_else(|| PaymentError::NotConfigured.into())
}

/// Submits a manual transfer for verification.
#[utoipa::path(
    post,
    path = "/payments/verifications",
    security(("bearer_auth" = [])),
    request_body = PaymentDetails,
    responses(
        (status = 200, description = "Verification created", body = VerificationResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 502, description = "Payment service failed", body = ApiError),
        (status = 503, description = "Payment service not configured", body = ApiError)
    ),
    tag = "payments"
)]
pub async fn submit_verification(
    State(state): State<AppState>,
    payload: Result<Json<PaymentDetails>, JsonRejection>,
) -> Result<Json<VerificationResponse>, ApiError> {
    let Json(details) = payload?;

    let mut missing = serde_json::Map::new();
    for (field, value) in [
        ("email", &details.email),
        ("userEmail", &details.user_email),
        ("planId", &details.plan_id),
        ("transactionId", &details.transaction_id),
    ] {
        if value.trim().is_empty() {
            missing.insert(field.to_string(), json!("Must not be empty"));
        }
    }
    if !details.amount.is_finite() || details.amount <= 0.0 {
        missing.insert("amount".to_string(), json!("Must be a positive number"));
    }
    if !missing.is_empty() {
        return Err(validation_error(
            "Invalid payment details",
            serde_json::Value::Object(missing),
        ));
    }

    let id = payment_service(&state)?
        .submit_verification(&details)
        .await?;

    Ok(Json(VerificationResponse {
        verification_id: id.0,
        decision: None,
    }))
}

/// Approves or rejects a submitted verification.
#[utoipa::path(
    post,
    path = "/payments/verifications/{id}/resolve",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Verification id returned on submission")),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Verification resolved", body = VerificationResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 502, description = "Payment service failed", body = ApiError),
        (status = 503, description = "Payment service not configured", body = ApiError)
    ),
    tag = "payments"
)]
pub async fn resolve_verification(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<VerificationResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;

    let id = VerificationId(id);
    payment_service(&state)?
        .resolve_verification(&id, request.action)
        .await?;

    Ok(Json(VerificationResponse {
        verification_id: id.0,
        decision: Some(request.action),
    }))
}
