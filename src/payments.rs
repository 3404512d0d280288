//! Client for the external payment verification service.
//!
//! Two operations: submit a transfer for manual verification, and approve or
//! reject a submitted verification.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

const BODY_SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Address the payment was sent from
    pub email: String,
    /// Account email of the paying user
    pub user_email: String,
    pub plan_id: String,
    pub transaction_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct VerificationId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationDecision {
    Approve,
    Reject,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment verification service is not configured")]
    NotConfigured,
    #[error("invalid payment service url: {0}")]
    InvalidUrl(String),
    #[error("payment service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment service returned status {status}")]
    Upstream { status: u16, body: Option<String> },
    #[error("payment service rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PaymentVerificationService: Send + Sync {
    async fn submit_verification(
        &self,
        details: &PaymentDetails,
    ) -> Result<VerificationId, PaymentError>;

    async fn resolve_verification(
        &self,
        id: &VerificationId,
        decision: VerificationDecision,
    ) -> Result<(), PaymentError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    verification_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest<'a> {
    verification_id: &'a str,
    action: VerificationDecision,
}

/// Calls `{base}/notify-payment` and `{base}/verify-payment`.
#[derive(Clone)]
pub struct HttpPaymentVerifier {
    client: Client,
    base: Url,
}

impl HttpPaymentVerifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PaymentError> {
        let mut base =
            Url::parse(base_url).map_err(|e| PaymentError::InvalidUrl(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, name: &str) -> Result<Url, PaymentError> {
        self.base
            .join(name)
            .map_err(|e| PaymentError::InvalidUrl(e.to_string()))
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<FunctionResponse, PaymentError> {
        let response = self.client.post(self.endpoint(name)?).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().map(|b| {
                if b.chars().count() > BODY_SNIPPET_LEN {
                    let truncated: String = b.chars().take(BODY_SNIPPET_LEN).collect();
                    format!("{}...", truncated)
                } else {
                    b
                }
            });
            tracing::warn!(function = name, status = status.as_u16(), "Payment function failed");
            return Err(PaymentError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: FunctionResponse = response.json().await?;
        if parsed.success == Some(false) || parsed.error.is_some() {
            return Err(PaymentError::Rejected(
                parsed
                    .error
                    .or(parsed.message)
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl PaymentVerificationService for HttpPaymentVerifier {
    async fn submit_verification(
        &self,
        details: &PaymentDetails,
    ) -> Result<VerificationId, PaymentError> {
        let response = self.call("notify-payment", details).await?;
        let id = response.verification_id.ok_or_else(|| {
            PaymentError::Rejected("response did not include a verification id".to_string())
        })?;
        tracing::info!(plan_id = %details.plan_id, verification_id = %id, "Payment submitted for verification");
        Ok(VerificationId(id))
    }

    async fn resolve_verification(
        &self,
        id: &VerificationId,
        decision: VerificationDecision,
    ) -> Result<(), PaymentError> {
        self.call(
            "verify-payment",
            &ResolveRequest {
                verification_id: &id.0,
                action: decision,
            },
        )
        .await?;
        tracing::info!(verification_id = %id.0, decision = ?decision, "Payment verification resolved");
        Ok(())
    }
}
