//! # OAuth State Repository
//!
//! Stores pending authorizations between the redirect and the return.
//! At most one row is kept per `(user_id, provider)`; expired rows are purged
//! whenever a new redirect is recorded.

use chrono::{Duration, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::oauth_state::{self, ActiveModel, Entity, Model};

pub struct OAuthStateRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthStateRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Records a pending authorization for `(user_id, provider)`.
    ///
    /// Replaces any earlier row for the pair and deletes expired rows of all
    /// users in the same transaction.
    pub async fn replace(
        &self,
        user_id: Uuid,
        platform_name: &str,
        provider: &str,
        expires_in_minutes: i64,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let model = Model {
            id: Uuid::new_v4(),
            user_id,
            platform_name: platform_name.to_string(),
            provider: provider.to_string(),
            expires_at: (now + Duration::minutes(expires_in_minutes)).into(),
            created_at: now.into(),
        };

        let txn = self.db.begin().await?;
        let purged = Self::delete_expired(&txn).await?;
        Self::delete_for_pair(&txn, user_id, provider).await?;

        let am = ActiveModel {
            id: Set(model.id),
            user_id: Set(model.user_id),
            platform_name: Set(model.platform_name.clone()),
            provider: Set(model.provider.clone()),
            expires_at: Set(model.expires_at),
            created_at: Set(model.created_at),
        };
        Entity::insert(am).exec_without_returning(&txn).await?;
        txn.commit().await?;

        if purged > 0 {
            tracing::debug!(purged, "Purged expired pending authorizations");
        }
        Ok(model)
    }

    /// Consumes the newest unexpired state for `(user_id, provider)`.
    ///
    /// Every state for the pair is deleted, expired or not, so a later return
    /// cannot pick up a stale redirect.
    pub async fn take_latest(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<Option<Model>, DbErr> {
        let states = Entity::find()
            .filter(oauth_state::Column::UserId.eq(user_id))
            .filter(oauth_state::Column::Provider.eq(provider))
            .order_by_desc(oauth_state::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        if states.is_empty() {
            return Ok(None);
        }

        Self::delete_for_pair(&*self.db, user_id, provider).await?;

        let now = Utc::now();
        Ok(states.into_iter().find(|s| s.expires_at > now))
    }

    async fn delete_expired<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        let result = Entity::delete_many()
            .filter(oauth_state::Column::ExpiresAt.lt(Utc::now()))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_for_pair<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        provider: &str,
    ) -> Result<u64, DbErr> {
        let result = Entity::delete_many()
            .filter(oauth_state::Column::UserId.eq(user_id))
            .filter(oauth_state::Column::Provider.eq(provider))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
