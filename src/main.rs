mod config;
mod database;
mod error;
mod fetch;
mod ingest;
mod models;
mod server;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::database::HoldingsStore;
use crate::fetch::FetcherRegistry;
use crate::ingest::IngestDriver;
use crate::server::AppState;

#[derive(Parser)]
#[command(
    name = "futures-holdings",
    about = "Collects daily futures-exchange holdings rankings into SQLite"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the database schema
    InitDb {
        /// Drop the holdings table first (destroys all data)
        #[arg(long)]
        drop: bool,
    },
    /// Collect holdings data for a date range
    UpdateData {
        /// Start date, format YYYYMMDD
        #[arg(long)]
        start_date: String,
        /// End date, format YYYYMMDD (defaults to today)
        #[arg(long)]
        end_date: Option<String>,
        /// Exchange name: SHFE, CFFEX, DCE or CZCE (case-insensitive)
        #[arg(long)]
        exchange: String,
    },
    /// Run the HTTP server
    Serve {
        /// Bind address, e.g. 127.0.0.1:8000
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("futures_holdings=info,info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let cli = Cli::parse();
    match cli.command {
        Command::InitDb { drop } => {
            let store = HoldingsStore::new(&config.database_file).await?;
            if drop {
                store.reset().await?;
            }
            println!("Initialized database at {}", config.database_file);
        }
        Command::UpdateData {
            start_date,
            end_date,
            exchange,
        } => {
            let store = HoldingsStore::new(&config.database_file).await?;
            let registry = FetcherRegistry::with_defaults(&config)?;
            let driver = IngestDriver::new(store, registry);

            let report = driver
                .ingest_range_str(&exchange, &start_date, end_date.as_deref())
                .await?;
            println!(
                "Ingested {} records over {} days ({} skipped)",
                report.records_inserted, report.days_visited, report.days_skipped
            );
        }
        Command::Serve { bind } => {
            let store = HoldingsStore::new(&config.database_file).await?;
            let registry = FetcherRegistry::with_defaults(&config)?;
            let driver = IngestDriver::new(store, registry);
            let state = Arc::new(AppState { driver });

            let bind_address = bind.unwrap_or(config.bind_address);
            server::serve(state, &bind_address).await?;
        }
    }

    Ok(())
}
