//! Platform catalog entity
//!
//! Reference data describing each social platform a user can connect.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "platforms")]
pub struct Model {
    /// Normalized platform key (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    /// Display name, e.g. "YouTube"
    pub name: String,

    pub icon_ref: String,

    pub color_tag: String,

    /// Position in the rendered list
    pub display_order: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
