//! Creates the `oauth_states` table.
//!
//! A row is written when a platform action starts an OAuth redirect and is
//! consumed when the identity provider sends the user back, so the returned
//! provider can be mapped to the platform the user picked.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuthStates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuthStates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuthStates::UserId).uuid().not_null())
                    .col(ColumnDef::new(OAuthStates::PlatformName).text().not_null())
                    .col(ColumnDef::new(OAuthStates::Provider).text().not_null())
                    .col(
                        ColumnDef::new(OAuthStates::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuthStates::CreatedAt)
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
                    .name("idx_oauth_states_user_provider")
                    .table(OAuthStates::Table)
                    .col(OAuthStates::UserId)
                    .col(OAuthStates::Provider)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuthStates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OAuthStates {
    #[sea_orm(iden = "oauth_states")]
    Table,
    Id,
    UserId,
    PlatformName,
    Provider,
    ExpiresAt,
    CreatedAt,
}
