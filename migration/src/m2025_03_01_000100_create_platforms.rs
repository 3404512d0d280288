//! Creates the `platforms` catalog table.
//!
//! Rows are keyed by the normalized platform key (trimmed, lowercased name)
//! and carry the presentation data shown next to each connection toggle.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Platforms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Platforms::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Platforms::Name).string().not_null())
                    .col(ColumnDef::new(Platforms::IconRef).string().not_null())
                    .col(ColumnDef::new(Platforms::ColorTag).string().not_null())
                    .col(
                        ColumnDef::new(Platforms::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Platforms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Platforms::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Platforms::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Platforms {
    Table,
    Key,
    Name,
    IconRef,
    ColorTag,
    DisplayOrder,
    CreatedAt,
    UpdatedAt,
}
