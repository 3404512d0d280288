//! # Server
//!
//! Application state, router assembly and the serve loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::controller::ConnectionController;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::oauth_return::OAuthReturnHandler;
use crate::payments::{HttpPaymentVerifier, PaymentVerificationService};
use crate::redirect::{IdentityProviderRedirector, OAuthRedirector};
use crate::store::{ConnectionStore, SeaOrmConnectionStore};
use crate::telemetry::trace_id_middleware;
use crate::webhook::{EventSink, WebhookNotifier, WebhookSettings};

const PAYMENTS_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared resources handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub store: Arc<dyn ConnectionStore>,
    pub controller: Arc<ConnectionController>,
    pub oauth_return: Arc<OAuthReturnHandler>,
    pub payments: Option<Arc<dyn PaymentVerificationService>>,
}

impl AppState {
    /// Wires the components around explicit collaborators.
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        store: Arc<dyn ConnectionStore>,
        redirector: Arc<dyn OAuthRedirector>,
        events: Arc<dyn EventSink>,
        payments: Option<Arc<dyn PaymentVerificationService>>,
    ) -> Self {
        let controller = Arc::new(ConnectionController::new(
            Arc::clone(&store),
            redirector,
            Arc::clone(&events),
        ));
        let oauth_return = Arc::new(OAuthReturnHandler::new(Arc::clone(&store), events));

        Self {
            config,
            db,
            store,
            controller,
            oauth_return,
            payments,
        }
    }

    /// Production wiring: SeaORM store, HTTP webhook notifier, hosted identity
    /// provider redirects and the payment client when configured.
    pub fn from_config(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<Self> {
        let key_bytes = config
            .crypto_key
            .clone()
            .context("POSTWAVE_CRYPTO_KEY is required")?;
        let crypto_key = CryptoKey::new(key_bytes).context("invalid crypto key")?;

        let store: Arc<dyn ConnectionStore> = Arc::new(SeaOrmConnectionStore::new(
            Arc::new(db.clone()),
            crypto_key,
            config.oauth_state_ttl_minutes,
        ));

        let notifier = WebhookNotifier::new(WebhookSettings::from_config(&config))
            .context("failed to build webhook notifier")?;
        if !notifier.is_enabled() {
            tracing::warn!("POSTWAVE_WEBHOOK_URL not set; connection events will not be forwarded");
        }

        let redirector = IdentityProviderRedirector::from_config(&config);

        let payments = match config.payments_base_url.as_deref() {
            Some(base) => {
                let verifier = HttpPaymentVerifier::new(base, PAYMENTS_TIMEOUT)
                    .context("failed to build payment client")?;
                Some(Arc::new(verifier) as Arc<dyn PaymentVerificationService>)
            }
            None => None,
        };

        Ok(Self::new(
            Arc::new(config),
            db,
            store,
            Arc::new(redirector),
            Arc::new(notifier),
            payments,
        ))
    }
}

/// Builds the router: public root/health/docs, token-protected API routes.
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/platforms", get(handlers::platforms::list_platforms))
        .route("/platforms/sync", post(handlers::platforms::sync_platforms))
        .route(
            "/platforms/{name}/action",
            post(handlers::platforms::platform_action),
        )
        .route("/oauth/return", post(handlers::oauth::oauth_return))
        .route(
            "/payments/verifications",
            post(handlers::payments::submit_verification),
        )
        .route(
            "/payments/verifications/{id}/resolve",
            post(handlers::payments::resolve_verification),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves until Ctrl-C or SIGTERM.
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr().context("invalid server address")?;
    let profile = config.profile.clone();
    let app = create_app(AppState::from_config(config, db)?);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::platforms::list_platforms,
        crate::handlers::platforms::platform_action,
        crate::handlers::platforms::sync_platforms,
        crate::handlers::oauth::oauth_return,
        crate::handlers::payments::submit_verification,
        crate::handlers::payments::resolve_verification,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::error::ApiError,
            crate::store::PlatformListing,
            crate::store::PlatformView,
            crate::store::Origin,
            crate::repositories::UpsertChange,
            crate::controller::ActionOutcome,
            crate::handlers::platforms::PlatformActionRequest,
            crate::handlers::platforms::SyncResponse,
            crate::oauth_return::AuthSession,
            crate::oauth_return::ReturnOutcome,
            crate::payments::PaymentDetails,
            crate::payments::VerificationDecision,
            crate::handlers::payments::VerificationResponse,
            crate::handlers::payments::ResolveRequest,
        )
    ),
    modifiers(&BearerSecurity),
    info(
        title = "Postwave API",
        description = "Platform connections, OAuth return reconciliation and payment verification",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
