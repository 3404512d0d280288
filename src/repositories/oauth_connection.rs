//! OAuth connection repository
//!
//! Rows are keyed by `(user_id, platform_key)` and written with a single
//! `INSERT ... ON CONFLICT DO UPDATE`, so concurrent returns for the same
//! platform collapse into one row.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use super::UpsertChange;
use crate::crypto::{CredentialContext, CryptoKey, token_fingerprint};
use crate::models::oauth_connection::{self, Entity as OAuthConnection};
use crate::platforms::PlatformKey;

pub const ORIGIN_LABEL: &str = "oauth";

/// Input for [`OAuthConnectionRepository::upsert`].
#[derive(Debug, Clone)]
pub struct OAuthConnectionInput<'a> {
    pub user_id: Uuid,
    pub platform_name: &'a str,
    pub provider: &'a str,
    pub external_user_id: Option<&'a str>,
    pub access_token: &'a str,
    pub refresh_token: Option<&'a str>,
    pub profile_data: Option<JsonValue>,
}

/// Decrypted OAuth tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConnectionRepository {
    pub db: Arc<DatabaseConnection>,
    pub crypto_key: CryptoKey,
}

impl OAuthConnectionRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// All OAuth connections of a user, oldest first
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<oauth_connection::Model>> {
        let rows = OAuthConnection::find()
            .filter(oauth_connection::Column::UserId.eq(user_id))
            .order_by_asc(oauth_connection::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    pub async fn find_by_user_and_platform(
        &self,
        user_id: Uuid,
        platform_key: &PlatformKey,
    ) -> Result<Option<oauth_connection::Model>> {
        let row = OAuthConnection::find()
            .filter(oauth_connection::Column::UserId.eq(user_id))
            .filter(oauth_connection::Column::PlatformKey.eq(platform_key.as_str()))
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    /// Most recently updated connection the user made through `provider`
    pub async fn find_latest_by_user_and_provider(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<Option<oauth_connection::Model>> {
        let row = OAuthConnection::find()
            .filter(oauth_connection::Column::UserId.eq(user_id))
            .filter(oauth_connection::Column::Provider.eq(provider))
            .order_by_desc(oauth_connection::Column::UpdatedAt)
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    /// Creates or replaces the row for `(user_id, platform_key)`.
    ///
    /// Returns [`UpsertChange::Unchanged`] without writing when the stored row
    /// already carries the same tokens, external user and profile.
    pub async fn upsert(
        &self,
        input: OAuthConnectionInput<'_>,
    ) -> Result<(oauth_connection::Model, UpsertChange)> {
        let platform_key = PlatformKey::new(input.platform_name)
            .ok_or_else(|| anyhow!("platform name must not be blank"))?;
        let fingerprint = token_fingerprint(input.access_token, input.refresh_token);

        let existing = self
            .find_by_user_and_platform(input.user_id, &platform_key)
            .await?;

        if let Some(ref row) = existing
            && row.token_fingerprint.as_deref() == Some(fingerprint.as_str())
            && row.external_user_id.as_deref() == input.external_user_id
            && row.provider == input.provider
            && row.profile_data == input.profile_data
        {
            return Ok((row.clone(), UpsertChange::Unchanged));
        }

        let context = CredentialContext {
            user_id: input.user_id,
            platform_key: platform_key.as_str(),
            origin: ORIGIN_LABEL,
        };
        let access_ciphertext = context
            .seal(&self.crypto_key, input.access_token)
            .map_err(|e| anyhow!("Token encryption failed: {}", e))?;
        let refresh_ciphertext = input
            .refresh_token
            .map(|token| context.seal(&self.crypto_key, token))
            .transpose()
            .map_err(|e| anyhow!("Token encryption failed: {}", e))?;

        let now = Utc::now();
        let am = oauth_connection::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(input.user_id),
            platform_key: Set(platform_key.as_str().to_string()),
            platform_name: Set(input.platform_name.trim().to_string()),
            provider: Set(input.provider.to_string()),
            external_user_id: Set(input.external_user_id.map(str::to_string)),
            access_token_ciphertext: Set(Some(access_ciphertext)),
            refresh_token_ciphertext: Set(refresh_ciphertext),
            token_fingerprint: Set(Some(fingerprint)),
            profile_data: Set(input.profile_data),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        OAuthConnection::insert(am)
            .on_conflict(
                OnConflict::columns([
                    oauth_connection::Column::UserId,
                    oauth_connection::Column::PlatformKey,
                ])
                .update_columns([
                    oauth_connection::Column::PlatformName,
                    oauth_connection::Column::Provider,
                    oauth_connection::Column::ExternalUserId,
                    oauth_connection::Column::AccessTokenCiphertext,
                    oauth_connection::Column::RefreshTokenCiphertext,
                    oauth_connection::Column::TokenFingerprint,
                    oauth_connection::Column::ProfileData,
                    oauth_connection::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        let stored = self
            .find_by_user_and_platform(input.user_id, &platform_key)
            .await?
            .ok_or_else(|| anyhow!("oauth connection for '{}' not persisted", platform_key))?;

        let change = if existing.is_some() {
            UpsertChange::Updated
        } else {
            UpsertChange::Created
        };
        Ok((stored, change))
    }

    /// Deletes the user's row for a platform on the given connection or transaction.
    pub async fn delete_by_user_and_platform<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        platform_key: &PlatformKey,
    ) -> Result<u64, DbErr> {
        let result = OAuthConnection::delete_many()
            .filter(oauth_connection::Column::UserId.eq(user_id))
            .filter(oauth_connection::Column::PlatformKey.eq(platform_key.as_str()))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Decrypts the tokens stored on a row
    pub fn decrypt_tokens(&self, row: &oauth_connection::Model) -> Result<OAuthTokens> {
        let context = CredentialContext {
            user_id: row.user_id,
            platform_key: &row.platform_key,
            origin: ORIGIN_LABEL,
        };
        let open = |ciphertext: &Option<Vec<u8>>| {
            ciphertext
                .as_deref()
                .map(|bytes| context.open(&self.crypto_key, bytes))
                .transpose()
        };

        let access_token = open(&row.access_token_ciphertext).map_err(|e| {
            tracing::error!(
                user_id = %row.user_id,
                platform_key = %row.platform_key,
                "Access token decryption failed"
            );
            anyhow!("Token decryption failed: {}", e)
        })?;
        let refresh_token = open(&row.refresh_token_ciphertext).map_err(|e| {
            tracing::error!(
                user_id = %row.user_id,
                platform_key = %row.platform_key,
                "Refresh token decryption failed"
            );
            anyhow!("Token decryption failed: {}", e)
        })?;

        Ok(OAuthTokens {
            access_token,
            refresh_token,
        })
    }
}
