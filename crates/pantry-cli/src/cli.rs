//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Pantry - Track Pingo Doce grocery purchases
#[derive(Parser)]
#[command(name = "pantry")]
#[command(about = "Grocery purchase tracker for Pingo Doce receipts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to <data_dir>/pantry.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to $PANTRY_CONFIG, then the platform data dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run (defaults to `fetch`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Fetch the latest transaction with its products
    Fetch {
        /// Do not save the transaction to the database
        #[arg(long)]
        no_save: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List transactions from the retailer API
    Transactions {
        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Page size
        #[arg(short, long, default_value = "10")]
        size: u32,

        /// List stored transactions instead of calling the API
        #[arg(long)]
        local: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync transactions from the API into the local database
    Sync {
        /// Number of pages to fetch
        #[arg(short, long, default_value = "5")]
        pages: u32,

        /// Page size (defaults to the configured page size)
        #[arg(short, long)]
        size: Option<u32>,
    },

    /// Import a JSON dump directory containing transactions.json
    Import {
        /// Directory holding transactions.json
        dir: PathBuf,
    },

    /// Show spending analytics
    #[command(alias = "analytics")]
    Report {
        /// Number of days to analyze
        #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(i64).range(1..))]
        days: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show product price trends
    Prices {
        /// Filter by product name (case and accent insensitive)
        #[arg(short, long)]
        product: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export transactions and products to CSV
    Export {
        /// Output directory (defaults to the data directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Show database statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Enrich products with catalog data and nutrition facts
    Enrich {
        /// Maximum number of products to process
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Store whose catalog is queried
        #[arg(long)]
        store: Option<String>,

        /// Pause between lookups in milliseconds (defaults to config)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Analyze diet health from purchase history
    Health {
        /// Number of days to analyze (all history when omitted)
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..))]
        days: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
