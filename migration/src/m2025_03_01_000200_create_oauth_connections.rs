//! Creates the `oauth_connections` table.
//!
//! One row per user and platform key, written when an OAuth handshake with
//! the identity provider completes. Tokens are stored encrypted.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuthConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuthConnections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuthConnections::UserId).uuid().not_null())
                    .col(ColumnDef::new(OAuthConnections::PlatformKey).text().not_null())
                    .col(ColumnDef::new(OAuthConnections::PlatformName).text().not_null())
                    .col(ColumnDef::new(OAuthConnections::Provider).text().not_null())
                    .col(ColumnDef::new(OAuthConnections::ExternalUserId).text().null())
                    .col(
                        ColumnDef::new(OAuthConnections::AccessTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuthConnections::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuthConnections::TokenFingerprint)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuthConnections::ProfileData)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuthConnections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OAuthConnections::UpdatedAt)
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
                    .name("idx_oauth_connections_user_platform")
                    .table(OAuthConnections::Table)
                    .col(OAuthConnections::UserId)
                    .col(OAuthConnections::PlatformKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_connections_user_provider")
                    .table(OAuthConnections::Table)
                    .col(OAuthConnections::UserId)
                    .col(OAuthConnections::Provider)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth_connections_user_provider")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth_connections_user_platform")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(OAuthConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OAuthConnections {
    #[sea_orm(iden = "oauth_connections")]
    Table,
    Id,
    UserId,
    PlatformKey,
    PlatformName,
    Provider,
    ExternalUserId,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    TokenFingerprint,
    ProfileData,
    CreatedAt,
    UpdatedAt,
}
