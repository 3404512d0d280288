//! # Repository Layer
//!
//! Repositories encapsulate SeaORM operations for each table. Connection
//! repositories own the crypto key and never hand ciphertext to callers.

pub mod api_key_connection;
pub mod oauth_connection;
pub mod oauth_state;
pub mod platform;

pub use api_key_connection::ApiKeyConnectionRepository;
pub use oauth_connection::OAuthConnectionRepository;
pub use oauth_state::OAuthStateRepository;
pub use platform::PlatformRepository;

use serde::Serialize;
use utoipa::ToSchema;

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpsertChange {
    Created,
    Updated,
    /// The stored row already held the same credentials; nothing was written.
    Unchanged,
}

impl UpsertChange {
    pub fn is_write(&self) -> bool {
        !matches!(self, UpsertChange::Unchanged)
    }
}
