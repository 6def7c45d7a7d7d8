use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songplay_etl::{config::Config, pipeline, schema};

use sqlx::postgres::PgPoolOptions;

#[derive(Parser)]
#[command(name = "songplay-etl")]
#[command(version = "0.1.0")]
#[command(about = "ETL pipeline loading music streaming events into a dimensional warehouse")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create every warehouse table (idempotent)
    CreateTables,
    /// Drop every warehouse table
    DropTables,
    /// Row-wise load: walk the local data directories and insert per record
    Etl,
    /// Set-wise load: bulk copy into staging, then transform in the engine
    Warehouse,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("songplay_etl={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting songplay ETL v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections.unwrap_or(5))
        .connect(&config.database.url)
        .await?;
    info!("Database connection established");

    match cli.command {
        Command::CreateTables => {
            schema::create_all(&pool).await?;
            info!("Warehouse tables created");
        }
        Command::DropTables => {
            schema::drop_all(&pool).await?;
            info!("Warehouse tables dropped");
        }
        Command::Etl => {
            pipeline::run_row_wise(&pool, &config).await?;
            info!("Row-wise load complete");
        }
        Command::Warehouse => {
            pipeline::run_set_wise(&pool, &config).await?;
            info!("Set-wise load complete");
        }
    }

    Ok(())
}
