//! Pantry CLI - Pingo Doce grocery tracker
//!
//! Usage:
//!   pantry init                 Initialize database
//!   pantry fetch                Fetch and save the latest transaction
//!   pantry sync --pages 5       Sync transaction history
//!   pantry report --days 30     Spending analytics
//!   pantry health               Diet health analysis

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pantry_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());

    match cli.command.unwrap_or(Commands::Fetch {
        no_save: false,
        json: false,
    }) {
        Commands::Init => commands::cmd_init(&db_path),
        Commands::Fetch { no_save, json } => {
            commands::cmd_fetch(&config, &db_path, !no_save, json).await
        }
        Commands::Transactions {
            page,
            size,
            local,
            json,
        } => {
            if local {
                let db = commands::open_db(&db_path)?;
                commands::cmd_transactions_local(&db, size as usize, json)
            } else {
                commands::cmd_transactions(&config, page, size, json).await
            }
        }
        Commands::Sync { pages, size } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_sync(&config, &db, pages, size.unwrap_or(config.page_size)).await
        }
        Commands::Import { dir } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_import(&db, &dir)
        }
        Commands::Report { days, json } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_report(&db, days, json)
        }
        Commands::Prices { product, json } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_prices(&db, product.as_deref(), json)
        }
        Commands::Export { dir } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_export(&db, &dir.unwrap_or_else(|| config.data_dir.clone()))
        }
        Commands::Stats { json } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_stats(&db, json)
        }
        Commands::Enrich {
            limit,
            store,
            delay_ms,
        } => {
            let db = commands::open_db(&db_path)?;
            let client = commands::catalog_client(&config).await?;
            let delay = delay_ms
                .map(Duration::from_millis)
                .unwrap_or(config.enrich_delay);
            commands::cmd_enrich(&db, &client, limit, store, delay).await
        }
        Commands::Health { days, json } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_health(&db, days, json)
        }
    }
}
