//! Catalog enrichment command

use std::time::Duration;

use anyhow::{Context, Result};
use pantry_core::db::Database;
use pantry_core::{CatalogLookup, Config, ProductEnricher, RetailerClient};

/// Client for catalog lookups
///
/// Logs in when credentials are configured; the catalog also answers
/// anonymous requests, so missing credentials only produce a warning.
pub async fn catalog_client(config: &Config) -> Result<RetailerClient> {
    let mut client = RetailerClient::new(config).context("Failed to create API client")?;

    if config.validate_credentials().is_ok() {
        let profile = client.login().await.context("Login failed")?;
        println!("🔐 Logged in as {}", profile.display_name());
    } else {
        tracing::warn!("No credentials configured, querying the catalog anonymously");
    }

    Ok(client)
}

pub async fn cmd_enrich(
    db: &Database,
    catalog: &dyn CatalogLookup,
    limit: usize,
    store: Option<String>,
    delay: Duration,
) -> Result<()> {
    let products = db.products_needing_enrichment(limit)?;

    if products.is_empty() {
        println!("✅ All products are already enriched");
        return Ok(());
    }

    println!("🔎 Enriching {} products...", products.len());

    let enricher = ProductEnricher::new(catalog, db)
        .with_store(store)
        .with_delay(delay);
    let summary = enricher.enrich_batch(&products).await;

    println!();
    println!("✅ Enrichment complete!");
    println!("   Enriched:  {}", summary.enriched);
    println!("   Not found: {}", summary.not_found);
    if summary.errors > 0 {
        println!("   Errors:    {} (will be retried next run)", summary.errors);
    }

    Ok(())
}
