//! Creates the `api_key_connections` table for manually entered credentials.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiKeyConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApiKeyConnections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApiKeyConnections::UserId).uuid().not_null())
                    .col(ColumnDef::new(ApiKeyConnections::PlatformKey).text().not_null())
                    .col(ColumnDef::new(ApiKeyConnections::PlatformName).text().not_null())
                    .col(
                        ColumnDef::new(ApiKeyConnections::ApiKeyCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApiKeyConnections::ApiSecretCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ApiKeyConnections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ApiKeyConnections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_key_connections_user_platform")
                    .table(ApiKeyConnections::Table)
                    .col(ApiKeyConnections::UserId)
                    .col(ApiKeyConnections::PlatformKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_api_key_connections_user_platform")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ApiKeyConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ApiKeyConnections {
    Table,
    Id,
    UserId,
    PlatformKey,
    PlatformName,
    ApiKeyCiphertext,
    ApiSecretCiphertext,
    CreatedAt,
    UpdatedAt,
}
