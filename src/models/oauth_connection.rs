//! OAuth connection entity model
//!
//! Connections created by a completed OAuth handshake with the identity
//! provider. At most one row exists per `(user_id, platform_key)`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Normalized join key shared with the catalog and the API-key origin
    pub platform_key: String,

    /// Platform name as supplied when the connection was made
    pub platform_name: String,

    /// Provider identifier reported by the session (e.g. `google`)
    pub provider: String,

    /// Account identifier on the provider side
    pub external_user_id: Option<String>,

    /// Encrypted access token ciphertext
    pub access_token_ciphertext: Option<Vec<u8>>,

    /// Encrypted refresh token ciphertext
    pub refresh_token_ciphertext: Option<Vec<u8>>,

    /// Hex SHA-256 of the access and refresh tokens, compared to detect unchanged re-upserts
    pub token_fingerprint: Option<String>,

    /// Opaque profile JSON copied from the session
    #[sea_orm(column_type = "JsonBinary")]
    pub profile_data: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
