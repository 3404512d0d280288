//! # OAuth State Model
//!
//! Pending authorizations recorded when a platform action redirects the user
//! to the identity provider.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User who started the redirect
    pub user_id: Uuid,

    /// Platform the user clicked, e.g. "YouTube"
    pub platform_name: String,

    /// Provider the redirect targets, e.g. "google"
    pub provider: String,

    pub expires_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Pending authorization as seen by callers outside the repository layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub user_id: Uuid,
    pub platform_name: String,
    pub provider: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<Model> for PendingAuthorization {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            platform_name: model.platform_name,
            provider: model.provider,
            expires_at: model.expires_at.with_timezone(&chrono::Utc),
        }
    }
}
