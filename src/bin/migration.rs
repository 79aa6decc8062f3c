use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use amc_market_fees::migrator::Migrator;

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the market-fee schema", version)]
struct Cli {
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://amc.db?mode=rwc",
        help = "Database connection string"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Option<MigrationCommand>,
}

#[derive(Subcommand)]
enum MigrationCommand {
    /// Apply pending migrations (default)
    Up {
        #[arg(long, help = "Apply at most this many migrations")]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1, help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// Show which migrations have been applied
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    info!("Connecting to database: {}", cli.database_url);

    let mut options = ConnectOptions::new(cli.database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;

    match cli.command.unwrap_or(MigrationCommand::Up { steps: None }) {
        MigrationCommand::Up { steps } => {
            Migrator::up(&db, steps).await?;
            info!("Migration completed successfully");
        }
        MigrationCommand::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Rolled back migrations");
        }
        MigrationCommand::Status => {
            Migrator::status(&db).await?;
        }
        MigrationCommand::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Schema recreated");
        }
    }

    Ok(())
}
