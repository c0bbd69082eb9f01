//! Integration tests for pantry-core
//!
//! These tests exercise the full import → report → enrich → health workflow.

use std::fs;

use chrono::NaiveDate;
use pantry_core::{
    db::Database,
    enrich::{MockCatalog, ProductEnricher},
    health::{Category, HealthAnalyzer},
    import::import_json_dump,
    models::{CatalogProduct, EnrichmentStatus},
};
use serde_json::json;
use tempfile::TempDir;

/// Helper to write a dump with three shopping trips in March 2024
/// - Greens, fruit and legumes on every trip
/// - Chocolate once
/// - Olive oil price rising from 6.49 to 7.29
fn write_dump(dir: &TempDir) {
    let dump = json!({
        "T1": {
            "transactionId": "T1",
            "transactionDate": "2024-03-02T10:12:00",
            "storeId": "101",
            "storeName": "Pingo Doce Amoreiras",
            "total": "18,47",
            "totalDiscount": "1,20",
            "totalItems": 4,
            "details": {"products": [
                {"productId": "P1", "name": "Espinafres Baby", "purchaseQuantity": 1, "purchasePrice": 1.99,
                 "brand": {"id": "PD", "name": "Pingo Doce", "ownBrand": true}},
                {"productId": "P2", "name": "Maçã Gala kg", "purchaseQuantity": "1,250", "purchasePrice": 1.79},
                {"productId": "P3", "name": "Azeite Virgem Extra", "purchaseQuantity": 1, "purchasePrice": 6.49},
                {"productId": "P4", "name": "Grão de Bico Cozido", "purchaseQuantity": 2, "purchasePrice": 0.89}
            ]}
        },
        "T2": {
            "transactionId": "T2",
            "transactionDate": "2024-03-09T17:40:00",
            "storeId": "101",
            "storeName": "Pingo Doce Amoreiras",
            "total": 14.1,
            "totalItems": 3,
            "details": {"products": [
                {"productId": "P1", "name": "Espinafres Baby", "purchaseQuantity": 1, "purchasePrice": 1.99,
                 "brand": {"id": "PD", "name": "Pingo Doce", "ownBrand": true}},
                {"productId": "P5", "name": "Chocolate de Leite", "purchaseQuantity": 1, "purchasePrice": 1.29,
                 "brand": "Milka"},
                {"productId": "P3", "name": "Azeite Virgem Extra", "purchaseQuantity": 1, "purchasePrice": 7.29}
            ]}
        },
        "T3": {
            "transactionId": "T3",
            "transactionDate": "2024-03-12T09:05:00",
            "storeId": "202",
            "storeName": "Pingo Doce Benfica",
            "total": 3.58,
            "totalItems": 2,
            "details": {"products": [
                {"productId": "P2", "name": "Maçã Gala kg", "purchaseQuantity": 0.8, "purchasePrice": 1.79},
                {"productId": "P4", "name": "Grão de Bico Cozido", "purchaseQuantity": 2, "purchasePrice": 0.89}
            ]}
        }
    });
    fs::write(dir.path().join("transactions.json"), dump.to_string()).unwrap();
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn imported_db() -> Database {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();
    write_dump(&dir);
    import_json_dump(&db, dir.path()).expect("Import failed");
    db
}

// =============================================================================
// Import and reporting
// =============================================================================

#[test]
fn test_full_import_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();
    write_dump(&dir);

    let stats = import_json_dump(&db, dir.path()).expect("Import failed");
    assert_eq!(stats.transactions, 3);
    assert_eq!(stats.products, 9);
    assert_eq!(stats.skipped, 0);

    // Re-import is a no-op
    let again = import_json_dump(&db, dir.path()).unwrap();
    assert_eq!(again.transactions, 0);
    assert_eq!(again.skipped, 3);

    let stats = db.stats().unwrap();
    assert_eq!(stats.total_transactions, 3);
    assert_eq!(stats.total_products, 5);
    assert_eq!(stats.total_spent, 36.15);

    let t1 = db.get_transaction("T1").unwrap().unwrap();
    assert_eq!(t1.transaction.total, Some(18.47));
    assert_eq!(t1.transaction.total_discount, Some(1.2));
    assert_eq!(t1.purchases.len(), 4);
    let apples = t1
        .purchases
        .iter()
        .find(|p| p.name == "Maçã Gala kg")
        .unwrap();
    assert_eq!(apples.quantity, Some(1.25));
}

#[test]
fn test_reports_after_import() {
    let db = imported_db();

    let report = db.spending_report_as_of(today(), 30).unwrap();
    assert_eq!(report.transaction_count, Some(3));
    let by_store = report.by_store.unwrap();
    assert_eq!(by_store[0].store, "Pingo Doce Amoreiras");
    assert_eq!(by_store[0].amount, 32.57);
    assert_eq!(by_store[1].store, "Pingo Doce Benfica");

    let top = report.top_products.unwrap();
    assert_eq!(top[0].name, "Grão de Bico Cozido");
    assert_eq!(top[0].quantity, 4.0);

    // Only the first trip falls inside a 10-day window ending on the 5th
    let short = db
        .spending_report_as_of(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), 10)
        .unwrap();
    assert_eq!(short.transaction_count, Some(1));

    let trends = db.price_trends(Some("azeite")).unwrap();
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0].first_price, 6.49);
    assert_eq!(trends[0].last_price, 7.29);
    assert_eq!(trends[0].price_change, 0.8);
    assert_eq!(trends[0].percent_change, 12.3);
}

// =============================================================================
// Enrichment
// =============================================================================

#[tokio::test]
async fn test_enrichment_batch() {
    let db = imported_db();

    let catalog = MockCatalog::new(vec![
        // Found by catalog code
        CatalogProduct {
            name: Some("Espinafres Baby Pingo Doce 150g".to_string()),
            ean: Some("5601312000011".to_string()),
            description: Some(
                "<p>Energia: 96 kj / 23 kcal</p><p>Proteínas: 2,9 g</p><p>Sal: 0,2 g</p>"
                    .to_string(),
            ),
            store_price: Some(1.99),
            product_internal_code: Some("P1".to_string()),
            ..CatalogProduct::default()
        },
        // Found by name search
        CatalogProduct {
            name: Some("Azeite Virgem Extra".to_string()),
            ean: Some("5601312000028".to_string()),
            description: Some("<p>Ingredientes: Azeite virgem extra.</p>".to_string()),
            ..CatalogProduct::default()
        },
    ])
    .fail_on("P5");

    let products = db.products_needing_enrichment(50).unwrap();
    assert_eq!(products.len(), 5);

    let enricher = ProductEnricher::new(&catalog, &db);
    let summary = enricher.enrich_batch(&products).await;

    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.not_found, 2);
    assert_eq!(summary.errors, 1);

    let spinach = db.find_product_by_external_id("P1").unwrap().unwrap();
    assert_eq!(spinach.enrichment_status, Some(EnrichmentStatus::Enriched));
    let nutrition = db.get_product_nutrition(spinach.id).unwrap().unwrap();
    assert_eq!(nutrition.energy_kcal, Some(23.0));

    let oil = db.find_product_by_external_id("P3").unwrap().unwrap();
    assert_eq!(oil.ean.as_deref(), Some("5601312000028"));
    assert_eq!(oil.ingredients.as_deref(), Some("Azeite virgem extra"));
    assert!(db.get_product_nutrition(oil.id).unwrap().is_none());

    let chickpeas = db.find_product_by_external_id("P4").unwrap().unwrap();
    assert_eq!(
        chickpeas.enrichment_status,
        Some(EnrichmentStatus::Unavailable)
    );

    // The failed product stays queued
    let remaining = db.products_needing_enrichment(50).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].external_id.as_deref(), Some("P5"));
}

#[tokio::test]
async fn test_enrich_empty_batch() {
    let db = Database::in_memory().unwrap();
    let catalog = MockCatalog::default();
    let summary = ProductEnricher::new(&catalog, &db)
        .enrich_batch(&[])
        .await;
    assert_eq!(summary, Default::default());
}

// =============================================================================
// Health analysis
// =============================================================================

#[test]
fn test_health_report_from_history() {
    let db = imported_db();

    let report = HealthAnalyzer::new(&db, Some(30))
        .as_of(today())
        .generate()
        .unwrap();

    assert_eq!(report.period.transactions, 3);
    assert_eq!(report.period.unique_products, 5);
    assert_eq!(report.summary.transactions, 3);
    assert_eq!(report.summary.total_spent, 36.15);

    let greens = report.category(Category::Greens).unwrap();
    assert_eq!(greens.total_purchases, 2);
    assert_eq!(greens.products[0].name, "Espinafres Baby");

    let legumes = report.category(Category::Legumes).unwrap();
    assert_eq!(legumes.total_purchases, 2);

    let sweets = report.category(Category::Sweets).unwrap();
    assert_eq!(sweets.total_purchases, 1);

    assert_eq!(report.fresh_produce.fruit_variety, 1);
    assert_eq!(report.fresh_produce.fruits[0].name, "Maçã Gala kg");

    let scores = report.health_scores.as_ref().unwrap();
    assert!(scores.overall_health_score >= 0 && scores.overall_health_score <= 100);

    // Recommendations come out in priority order
    let priorities: Vec<u8> = report.recommendations.iter().map(|r| r.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort_unstable();
    assert_eq!(priorities, sorted);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.category == Category::NutsSeeds));
}

#[test]
fn test_health_report_without_purchases() {
    let db = Database::in_memory().unwrap();
    let report = HealthAnalyzer::new(&db, None).generate().unwrap();

    assert!(report.health_scores.is_none());
    assert!(report.recommendations.is_empty());
    assert!(report.top_products.is_empty());
}
