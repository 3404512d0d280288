//! API-key connection entity model
//!
//! Manually entered credentials for platforms without an OAuth provider.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "api_key_connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub platform_key: String,

    pub platform_name: String,

    /// Encrypted API key
    pub api_key_ciphertext: Vec<u8>,

    /// Encrypted API secret, if the platform uses one
    pub api_secret_ciphertext: Option<Vec<u8>>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
