//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::time::Duration;

use clap::Parser;
use pantry_core::db::Database;
use pantry_core::models::{CatalogProduct, EnrichmentStatus};
use pantry_core::MockCatalog;
use serde_json::json;
use tempfile::TempDir;

use crate::cli::{Cli, Commands};
use crate::commands::{self, euros, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

/// Database with two trips to the same store, buying milk twice at different prices
fn setup_db_with_purchases() -> Database {
    let db = setup_test_db();
    let today = chrono::Local::now().date_naive();

    for (id, days_ago, price) in [("T1", 10, 0.89), ("T2", 3, 0.95)] {
        let date = today - chrono::Duration::days(days_ago);
        db.ingest_value(
            &json!({
                "transactionId": id,
                "transactionDate": format!("{}T10:00:00", date),
                "storeId": "101",
                "storeName": "Pingo Doce Amoreiras",
                "total": price + 1.99,
                "totalItems": 2,
            }),
            Some(&json!({"products": [
                {"productId": "P1", "name": "Leite Meio Gordo", "purchaseQuantity": 1, "purchasePrice": price},
                {"productId": "P2", "name": "Espinafres Baby", "purchaseQuantity": 1, "purchasePrice": 1.99}
            ]})),
        )
        .unwrap();
    }

    db
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("Leite", 10), "Leite");
    assert_eq!(truncate("Pingo Doce Amoreiras", 10), "Pingo D...");
    // Multi-byte characters are counted, not bytes
    assert_eq!(truncate("Maçã Gala Açores", 8), "Maçã ...");
}

#[test]
fn test_euros() {
    assert_eq!(euros(Some(3.5)), "3.50 EUR");
    assert_eq!(euros(None), "N/A");
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_report_days_default_and_bounds() {
    let cli = Cli::try_parse_from(["pantry", "report"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Report { days: 30, .. })));

    let cli = Cli::try_parse_from(["pantry", "analytics", "--days", "7"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Report { days: 7, .. })));

    assert!(Cli::try_parse_from(["pantry", "report", "--days", "0"]).is_err());
    assert!(Cli::try_parse_from(["pantry", "report", "--days", "-5"]).is_err());
}

#[test]
fn test_health_days_bounds() {
    let cli = Cli::try_parse_from(["pantry", "health"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Health { days: None, .. })));

    let cli = Cli::try_parse_from(["pantry", "health", "--days", "90"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Health { days: Some(90), .. })));

    assert!(Cli::try_parse_from(["pantry", "health", "--days", "0"]).is_err());
}

#[test]
fn test_cmd_report_huge_window() {
    let db = setup_db_with_purchases();
    assert!(commands::cmd_report(&db, 100_000_000, false).is_ok());
    assert!(commands::cmd_health(&db, Some(100_000_000), false).is_ok());
}

// ========== Core Command Tests ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("pantry.db");

    let result = commands::cmd_init(&db_path);
    assert!(result.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_cmd_stats() {
    let db = setup_db_with_purchases();
    assert!(commands::cmd_stats(&db, false).is_ok());
    assert!(commands::cmd_stats(&db, true).is_ok());
}

#[test]
fn test_cmd_stats_empty() {
    let db = setup_test_db();
    assert!(commands::cmd_stats(&db, false).is_ok());
}

#[test]
fn test_cmd_import() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();
    let dump = json!({
        "T9": {
            "transactionDate": "2024-05-04T12:00:00",
            "storeId": "7",
            "storeName": "Pingo Doce Benfica",
            "total": "4,20",
            "details": {"products": [
                {"productId": "P9", "name": "Pão de Forma", "purchaseQuantity": 2, "purchasePrice": "2,10"}
            ]}
        }
    });
    std::fs::write(dir.path().join("transactions.json"), dump.to_string()).unwrap();

    let result = commands::cmd_import(&db, dir.path());
    assert!(result.is_ok());
    assert!(db.transaction_exists("T9").unwrap());

    let conn = db.conn().unwrap();
    let purchases: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM purchases p
             JOIN transactions t ON p.transaction_id = t.id
             WHERE t.transaction_id = ?1",
            rusqlite::params!["T9"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(purchases, 1);
}

#[test]
fn test_cmd_import_missing_dump() {
    let db = setup_test_db();
    let dir = TempDir::new().unwrap();

    let result = commands::cmd_import(&db, dir.path());
    assert!(result.is_err());
}

#[test]
fn test_cmd_export() {
    let db = setup_db_with_purchases();
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("export");

    let result = commands::cmd_export(&db, &out);
    assert!(result.is_ok());

    let transactions = std::fs::read_to_string(out.join("transactions.csv")).unwrap();
    assert!(transactions.contains("T1"));
    assert!(transactions.contains("T2"));
    let products = std::fs::read_to_string(out.join("products.csv")).unwrap();
    assert!(products.contains("Leite Meio Gordo"));
}

// ========== Transaction Command Tests ==========

#[test]
fn test_cmd_transactions_local() {
    let db = setup_db_with_purchases();
    assert!(commands::cmd_transactions_local(&db, 10, false).is_ok());
    assert!(commands::cmd_transactions_local(&db, 1, true).is_ok());
}

#[test]
fn test_cmd_transactions_local_empty() {
    let db = setup_test_db();
    assert!(commands::cmd_transactions_local(&db, 10, false).is_ok());
}

// ========== Report Command Tests ==========

#[test]
fn test_cmd_report() {
    let db = setup_db_with_purchases();
    assert!(commands::cmd_report(&db, 30, false).is_ok());
    assert!(commands::cmd_report(&db, 30, true).is_ok());
}

#[test]
fn test_cmd_report_empty() {
    let db = setup_test_db();
    assert!(commands::cmd_report(&db, 7, false).is_ok());
}

#[test]
fn test_cmd_prices() {
    let db = setup_db_with_purchases();
    assert!(commands::cmd_prices(&db, None, false).is_ok());
    assert!(commands::cmd_prices(&db, Some("leite"), true).is_ok());

    let trends = db.price_trends(Some("leite")).unwrap();
    assert_eq!(trends.len(), 1);
    assert!(trends[0].price_change > 0.0);
}

#[test]
fn test_cmd_prices_no_repeats() {
    let db = setup_test_db();
    assert!(commands::cmd_prices(&db, Some("nothing"), false).is_ok());
}

#[test]
fn test_cmd_health() {
    let db = setup_db_with_purchases();
    assert!(commands::cmd_health(&db, None, false).is_ok());
    assert!(commands::cmd_health(&db, Some(30), true).is_ok());
}

#[test]
fn test_cmd_health_empty() {
    let db = setup_test_db();
    assert!(commands::cmd_health(&db, Some(7), false).is_ok());
}

// ========== Enrich Command Tests ==========

#[tokio::test]
async fn test_cmd_enrich_with_mock_catalog() {
    let db = setup_db_with_purchases();
    let catalog = MockCatalog::new(vec![CatalogProduct {
        name: Some("Leite Meio Gordo".to_string()),
        ean: Some("5601312012345".to_string()),
        description: Some("<p>Ingredientes: leite meio gordo.</p>".to_string()),
        store_price: Some(0.95),
        product_internal_code: Some("P1".to_string()),
        ..CatalogProduct::default()
    }]);

    let result =
        commands::cmd_enrich(&db, &catalog, 10, Some("101".to_string()), Duration::ZERO).await;
    assert!(result.is_ok());

    let milk = db.find_product_by_external_id("P1").unwrap().unwrap();
    assert_eq!(milk.enrichment_status, Some(EnrichmentStatus::Enriched));
    assert_eq!(milk.ean.as_deref(), Some("5601312012345"));

    let spinach = db.find_product_by_external_id("P2").unwrap().unwrap();
    assert_eq!(spinach.enrichment_status, Some(EnrichmentStatus::Unavailable));

    // Nothing left to process
    assert!(db.products_needing_enrichment(10).unwrap().is_empty());
    assert!(commands::cmd_enrich(&db, &catalog, 10, None, Duration::ZERO)
        .await
        .is_ok());
}
