//! API-key connection repository

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::UpsertChange;
use crate::crypto::{CredentialContext, CryptoKey};
use crate::models::api_key_connection::{self, Entity as ApiKeyConnection};
use crate::platforms::PlatformKey;

pub const ORIGIN_LABEL: &str = "api_key";

#[derive(Debug, Clone)]
pub struct ApiKeyConnectionRepository {
    pub db: Arc<DatabaseConnection>,
    pub crypto_key: CryptoKey,
}

impl ApiKeyConnectionRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<api_key_connection::Model>> {
        let rows = ApiKeyConnection::find()
            .filter(api_key_connection::Column::UserId.eq(user_id))
            .order_by_asc(api_key_connection::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    pub async fn find_by_user_and_platform(
        &self,
        user_id: Uuid,
        platform_key: &PlatformKey,
    ) -> Result<Option<api_key_connection::Model>> {
        let row = ApiKeyConnection::find()
            .filter(api_key_connection::Column::UserId.eq(user_id))
            .filter(api_key_connection::Column::PlatformKey.eq(platform_key.as_str()))
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    /// Creates or replaces the user's credentials for a platform.
    pub async fn upsert(
        &self,
        user_id: Uuid,
        platform_name: &str,
        api_key: &str,
        api_secret: Option<&str>,
    ) -> Result<(api_key_connection::Model, UpsertChange)> {
        let platform_key = PlatformKey::new(platform_name)
            .ok_or_else(|| anyhow!("platform name must not be blank"))?;
        let existed = self
            .find_by_user_and_platform(user_id, &platform_key)
            .await?
            .is_some();

        let context = CredentialContext {
            user_id,
            platform_key: platform_key.as_str(),
            origin: ORIGIN_LABEL,
        };
        let key_ciphertext = context
            .seal(&self.crypto_key, api_key)
            .map_err(|e| anyhow!("API key encryption failed: {}", e))?;
        let secret_ciphertext = api_secret
            .map(|secret| context.seal(&self.crypto_key, secret))
            .transpose()
            .map_err(|e| anyhow!("API secret encryption failed: {}", e))?;

        let now = Utc::now();
        let am = api_key_connection::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            platform_key: Set(platform_key.as_str().to_string()),
            platform_name: Set(platform_name.trim().to_string()),
            api_key_ciphertext: Set(key_ciphertext),
            api_secret_ciphertext: Set(secret_ciphertext),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        ApiKeyConnection::insert(am)
            .on_conflict(
                OnConflict::columns([
                    api_key_connection::Column::UserId,
                    api_key_connection::Column::PlatformKey,
                ])
                .update_columns([
                    api_key_connection::Column::PlatformName,
                    api_key_connection::Column::ApiKeyCiphertext,
                    api_key_connection::Column::ApiSecretCiphertext,
                    api_key_connection::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        let stored = self
            .find_by_user_and_platform(user_id, &platform_key)
            .await?
            .ok_or_else(|| anyhow!("api key connection for '{}' not persisted", platform_key))?;

        let change = if existed {
            UpsertChange::Updated
        } else {
            UpsertChange::Created
        };
        Ok((stored, change))
    }

    pub async fn delete_by_user_and_platform<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        platform_key: &PlatformKey,
    ) -> Result<u64, DbErr> {
        let result = ApiKeyConnection::delete_many()
            .filter(api_key_connection::Column::UserId.eq(user_id))
            .filter(api_key_connection::Column::PlatformKey.eq(platform_key.as_str()))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Decrypts the stored key and secret
    pub fn decrypt_credentials(
        &self,
        row: &api_key_connection::Model,
    ) -> Result<(String, Option<String>)> {
        let context = CredentialContext {
            user_id: row.user_id,
            platform_key: &row.platform_key,
            origin: ORIGIN_LABEL,
        };
        let api_key = context
            .open(&self.crypto_key, &row.api_key_ciphertext)
            .map_err(|e| anyhow!("API key decryption failed: {}", e))?;
        let api_secret = row
            .api_secret_ciphertext
            .as_deref()
            .map(|bytes| context.open(&self.crypto_key, bytes))
            .transpose()
            .map_err(|e| anyhow!("API secret decryption failed: {}", e))?;
        Ok((api_key, api_secret))
    }
}
