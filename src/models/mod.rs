//! # Data Models
//!
//! SeaORM entities backing the platform catalog, the two connection origins
//! and pending OAuth authorizations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod api_key_connection;
pub mod oauth_connection;
pub mod oauth_state;
pub mod platform;

pub use api_key_connection::Entity as ApiKeyConnection;
pub use oauth_connection::Entity as OAuthConnection;
pub use oauth_state::Entity as OAuthState;
pub use platform::Entity as Platform;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "postwave".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
