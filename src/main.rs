//! # Postwave Entry Point

use anyhow::Context;
use clap::{Parser, Subcommand};
use postwave::{
    config::ConfigLoader,
    db,
    migration::{Migrator, MigratorTrait},
    seeds::seed_platforms,
    server::run_server,
    telemetry,
};

#[derive(Debug, Parser)]
#[command(name = "postwave", version, about = "Postwave platform connection service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Apply migrations, seed the platform catalog and serve the API (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Seed the platform catalog and exit
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;
    telemetry::init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Effective configuration");
    }

    let db = db::init_pool(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            Migrator::up(&db, None).await.context("migration failed")?;
            tracing::info!("Migrations applied");
        }
        Command::Seed => {
            seed_platforms(&db).await?;
        }
        Command::Serve => {
            Migrator::up(&db, None).await.context("migration failed")?;
            seed_platforms(&db).await?;
            run_server(config, db).await?;
        }
    }

    Ok(())
}
