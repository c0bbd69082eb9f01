//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_stats` - Database statistics
//! - `cmd_import` - Import a JSON dump
//! - `cmd_export` - Export CSV files

use std::path::Path;

use anyhow::{Context, Result};
use pantry_core::db::Database;
use pantry_core::export::{PRODUCTS_CSV, TRANSACTIONS_CSV};
use pantry_core::import::import_json_dump;

/// Open the database, creating its parent directory if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Set PHONE_NUMBER and PASSWORD");
    println!("  2. Sync your purchases: pantry sync");
    println!("  3. See where the money goes: pantry report");

    Ok(())
}

pub fn cmd_stats(db: &Database, json: bool) -> Result<()> {
    let stats = db.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("📊 Database Statistics");
    println!("   ─────────────────────────────");
    println!("   Total transactions: {}", stats.total_transactions);
    println!("   Total products:     {}", stats.total_products);
    println!("   Total spent:        {:.2} EUR", stats.total_spent);

    match (stats.date_range.earliest, stats.date_range.latest) {
        (Some(earliest), Some(latest)) => {
            println!("   Date range:         {} to {}", earliest, latest)
        }
        _ => println!("   Date range:         No data"),
    }

    Ok(())
}

pub fn cmd_import(db: &Database, dir: &Path) -> Result<()> {
    println!("📥 Importing {}...", dir.display());

    let stats = import_json_dump(db, dir)
        .with_context(|| format!("Failed to import {}", dir.display()))?;

    println!();
    println!("✅ Import complete!");
    println!("   Transactions: {}", stats.transactions);
    println!("   Products:     {}", stats.products);
    if stats.skipped > 0 {
        println!("   Skipped:      {} (already stored)", stats.skipped);
    }

    Ok(())
}

pub fn cmd_export(db: &Database, dir: &Path) -> Result<()> {
    db.export_csv(dir)
        .with_context(|| format!("Failed to export to {}", dir.display()))?;

    println!("✅ Data exported successfully!");
    println!("   {}", dir.join(TRANSACTIONS_CSV).display());
    println!("   {}", dir.join(PRODUCTS_CSV).display());

    Ok(())
}
