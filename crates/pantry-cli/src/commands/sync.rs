//! Retailer API commands: fetch, transactions, sync

use std::path::Path;

use anyhow::{Context, Result};
use pantry_core::db::Database;
use pantry_core::normalize::value_to_id;
use pantry_core::{Config, RetailerClient};
use serde_json::{json, Value};

use super::{core::open_db, euros, truncate};

/// Create a client and log in with the configured credentials
pub async fn logged_in_client(config: &Config) -> Result<RetailerClient> {
    config.validate_credentials()?;

    let mut client = RetailerClient::new(config).context("Failed to create API client")?;
    let profile = client.login().await.context("Login failed")?;
    println!("🔐 Logged in as {}", profile.display_name());

    Ok(client)
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("N/A")
}

fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

pub async fn cmd_fetch(config: &Config, db_path: &Path, save: bool, json: bool) -> Result<()> {
    let mut client = RetailerClient::new(config).context("Failed to create API client")?;
    config.validate_credentials()?;

    let Some(latest) = client.latest_transaction_with_details().await? else {
        println!("No transactions found");
        return Ok(());
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "summary": latest.summary,
                "details": latest.details,
            }))?
        );
    } else {
        print_transaction(&latest.summary);
        print_products(&latest.details);
    }

    if save {
        let db = open_db(db_path)?;
        db.ingest_value(&latest.summary, Some(&latest.details))
            .context("Failed to save transaction")?;
        if !json {
            println!();
            println!("✅ Transaction saved to database");
        }
    }

    Ok(())
}

fn print_transaction(summary: &Value) {
    println!();
    println!("🧾 Latest Transaction");
    println!("   ─────────────────────────────");
    println!("   Date:  {}", text(summary, "transactionDate"));
    println!("   Store: {}", text(summary, "storeName"));
    println!("   Total: {} EUR", field(summary, "total"));
    println!("   Items: {}", field(summary, "totalItems"));
}

fn print_products(details: &Value) {
    let Some(products) = details.get("products").and_then(Value::as_array) else {
        return;
    };

    println!();
    println!("🛒 Products");
    for (i, product) in products.iter().enumerate() {
        println!(
            "   {:>2}. {}x {} - {} EUR",
            i + 1,
            field(product, "purchaseQuantity"),
            truncate(text(product, "name"), 45),
            field(product, "purchasePrice")
        );
    }
}

pub async fn cmd_transactions(config: &Config, page: u32, size: u32, json: bool) -> Result<()> {
    let client = logged_in_client(config).await?;
    let transactions = client.transactions(page, size).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&transactions)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions found");
        return Ok(());
    }

    println!();
    println!("📝 Transactions (page {})", page);
    println!("   ─────────────────────────────────────────────────────────────");
    for (i, t) in transactions.iter().enumerate() {
        println!(
            "   {:>2}. {} │ {} │ {} EUR │ {} items",
            i + 1,
            text(t, "transactionDate"),
            truncate(text(t, "storeName"), 30),
            field(t, "total"),
            field(t, "totalItems")
        );
    }

    Ok(())
}

pub fn cmd_transactions_local(db: &Database, limit: usize, json: bool) -> Result<()> {
    let transactions = db.list_transactions(Some(limit))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&transactions)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions stored. Sync some with:");
        println!("  pantry sync");
        return Ok(());
    }

    println!();
    println!("📝 Stored Transactions");
    println!("   ─────────────────────────────────────────────────────────────");
    for t in transactions {
        let date = t
            .transaction_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "   {} │ {:>12} │ {:>3} items │ {}",
            date,
            euros(t.total),
            t.total_items.unwrap_or(0),
            truncate(t.store_name.as_deref().unwrap_or("Unknown Store"), 30)
        );
    }

    Ok(())
}

/// Counters for a sync run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub async fn cmd_sync(config: &Config, db: &Database, pages: u32, size: u32) -> Result<()> {
    let client = logged_in_client(config).await?;
    let mut summary = SyncSummary::default();

    for page in 1..=pages {
        println!("📡 Fetching page {}...", page);
        let transactions = client.transactions(page, size).await?;
        if transactions.is_empty() {
            break;
        }

        for transaction in &transactions {
            let Some(transaction_id) = transaction.get("transactionId").and_then(value_to_id)
            else {
                println!("   ⚠️  Skipping transaction without an id");
                summary.failed += 1;
                continue;
            };

            if db.transaction_exists(&transaction_id)? {
                summary.skipped += 1;
                continue;
            }

            let store_id = transaction.get("storeId").and_then(value_to_id);
            let result = match client
                .transaction_details(&transaction_id, store_id.as_deref())
                .await
            {
                Ok(details) => db.ingest_value(transaction, Some(&details)),
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => {
                    summary.synced += 1;
                    println!(
                        "   ✓ {} - {} - {} EUR",
                        text(transaction, "transactionDate"),
                        text(transaction, "storeName"),
                        field(transaction, "total")
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    println!("   ✗ Failed to sync {}: {}", transaction_id, e);
                }
            }
        }
    }

    println!();
    println!(
        "✅ Sync complete! Synced: {}, Skipped (already stored): {}",
        summary.synced, summary.skipped
    );
    if summary.failed > 0 {
        println!("⚠️  {} transactions failed", summary.failed);
    }

    Ok(())
}
