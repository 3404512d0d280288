//! Database migrations for the Postwave connection service.

pub use sea_orm_migration::prelude::*;

mod m2025_03_01_000100_create_platforms;
mod m2025_03_01_000200_create_oauth_connections;
mod m2025_03_01_000300_create_api_key_connections;
mod m2025_03_01_000400_create_oauth_states;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_03_01_000100_create_platforms::Migration),
            Box::new(m2025_03_01_000200_create_oauth_connections::Migration),
            Box::new(m2025_03_01_000300_create_api_key_connections::Migration),
            Box::new(m2025_03_01_000400_create_oauth_states::Migration),
        ]
    }
}
