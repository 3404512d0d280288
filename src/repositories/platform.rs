//! Platform repository for the catalog table

use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use std::sync::Arc;

use crate::models::platform::{self, Entity as Platform};
use crate::platforms::PlatformDefinition;

/// Repository for platform catalog operations
#[derive(Debug, Clone)]
pub struct PlatformRepository {
    pub db: Arc<DatabaseConnection>,
}

impl PlatformRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds a platform by its normalized key
    pub async fn find_by_key(&self, key: &str) -> Result<Option<platform::Model>> {
        let platform = Platform::find_by_id(key.to_string())
            .one(&*self.db)
            .await?;
        Ok(platform)
    }

    /// Lists the catalog in display order
    pub async fn list_ordered(&self) -> Result<Vec<platform::Model>> {
        let platforms = Platform::find()
            .order_by_asc(platform::Column::DisplayOrder)
            .order_by_asc(platform::Column::Key)
            .all(&*self.db)
            .await?;
        Ok(platforms)
    }

    /// Lists the catalog as plain definitions
    pub async fn list_definitions(&self) -> Result<Vec<PlatformDefinition>> {
        Ok(self
            .list_ordered()
            .await?
            .into_iter()
            .map(|row| PlatformDefinition {
                name: row.name,
                icon_ref: row.icon_ref,
                color_tag: row.color_tag,
            })
            .collect())
    }

    /// Inserts or refreshes one catalog entry. Returns `true` when a new row was created.
    pub async fn upsert(&self, definition: &PlatformDefinition, display_order: i32) -> Result<bool> {
        let key = definition
            .key()
            .ok_or_else(|| anyhow::anyhow!("platform name must not be blank"))?;
        let now = Utc::now();

        if let Some(existing) = self.find_by_key(key.as_str()).await? {
            let mut am: platform::ActiveModel = existing.into();
            am.name = Set(definition.name.clone());
            am.icon_ref = Set(definition.icon_ref.clone());
            am.color_tag = Set(definition.color_tag.clone());
            am.display_order = Set(display_order);
            am.updated_at = Set(now.into());
            am.update(&*self.db).await?;
            Ok(false)
        } else {
            let am = platform::ActiveModel {
                key: Set(key.as_str().to_string()),
                name: Set(definition.name.clone()),
                icon_ref: Set(definition.icon_ref.clone()),
                color_tag: Set(definition.color_tag.clone()),
                display_order: Set(display_order),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            Platform::insert(am).exec_without_returning(&*self.db).await?;
            Ok(true)
        }
    }
}
