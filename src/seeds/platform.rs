//! Platform catalog seeding

use anyhow::{Context, Result};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::platforms::default_platforms;
use crate::repositories::PlatformRepository;

/// Inserts the default platform catalog, refreshing icons and colors of
/// entries that already exist. Safe to run on every start.
pub async fn seed_platforms(db: &DatabaseConnection) -> Result<()> {
    let repo = PlatformRepository::new(Arc::new(db.clone()));

    for (order, definition) in default_platforms().iter().enumerate() {
        let created = repo
            .upsert(definition, order as i32)
            .await
            .with_context(|| format!("failed to seed platform '{}'", definition.name))?;

        if created {
            log::info!("Created platform: {}", definition.name);
        } else {
            log::debug!("Platform '{}' already exists, refreshed", definition.name);
        }
    }

    log::info!("Platform seeding completed");
    Ok(())
}
