use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pizza_pantry::{
    db::{self, DbConfig},
    migrator::Migrator,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Applies or rolls back the pizza-pantry schema.
#[derive(Debug, Parser)]
#[command(name = "migration", version)]
struct Cli {
    /// Database URL; falls back to DATABASE_URL, then to the local SQLite file
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// List applied and pending migrations
    Status,
    /// Drop everything and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://pizza_pantry.db?mode=rwc".to_string());

    info!("Connecting to database");
    let pool = db::establish_connection_with_config(&DbConfig {
        url,
        max_connections: 1,
        ..Default::default()
    })
    .await
    .context("failed to connect to database")?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => db::run_migrations(&pool).await?,
        Command::Down { steps } => {
            info!(steps, "Rolling back migrations");
            Migrator::down(&pool, Some(steps)).await?;
        }
        Command::Status => Migrator::status(&pool).await?,
        Command::Fresh => {
            info!("Dropping all tables and re-applying migrations");
            Migrator::fresh(&pool).await?;
        }
    }

    info!("Migration command completed");
    Ok(())
}
