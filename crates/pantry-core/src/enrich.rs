//! Product enrichment from the retailer catalog
//!
//! Products are known only by name (and sometimes a catalog id) from
//! purchase lines. Enrichment looks each one up in the catalog, stores the
//! barcode, description and price, and extracts nutrition facts from the
//! description.
//!
//! Lookup strategy:
//! 1. Fetch by catalog id when the product has one
//! 2. Search by name and pick the best match (exact, containment, or a
//!    single close result)

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{CatalogProduct, Product};
use crate::text::{collapse_whitespace, contains_folded};

/// Results requested per name search
const SEARCH_PAGE_SIZE: u32 = 5;

/// Minimum word overlap to accept a lone search result
const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Catalog access used by enrichment
///
/// Implemented by the retailer client and by `MockCatalog` for tests.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Fetch a product by catalog code; `None` when the catalog has no such code
    async fn fetch_product_by_code(
        &self,
        code: &str,
        store_id: Option<&str>,
    ) -> Result<Option<CatalogProduct>>;

    /// Search products by free text
    async fn search_products(
        &self,
        query: &str,
        store_id: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<Vec<CatalogProduct>>;
}

/// Counters for a batch enrichment run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    pub enriched: usize,
    pub not_found: usize,
    pub errors: usize,
}

/// Runs catalog lookups and writes results to the database
pub struct ProductEnricher<'a> {
    catalog: &'a dyn CatalogLookup,
    db: &'a Database,
    store_id: Option<String>,
    delay: Duration,
}

impl<'a> ProductEnricher<'a> {
    pub fn new(catalog: &'a dyn CatalogLookup, db: &'a Database) -> Self {
        Self {
            catalog,
            db,
            store_id: None,
            delay: Duration::ZERO,
        }
    }

    /// Store whose catalog (prices, availability) is queried
    pub fn with_store(mut self, store_id: Option<String>) -> Self {
        self.store_id = store_id;
        self
    }

    /// Pause between consecutive lookups in a batch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Enrich one product; `Ok(false)` when the catalog has no match
    pub async fn enrich(&self, product: &Product) -> Result<bool> {
        info!(product_id = product.id, name = %product.name, "Enriching product");

        match self.find_in_catalog(product).await? {
            Some(catalog) => {
                self.db.enrich_product(product.id, &catalog)?;
                Ok(true)
            }
            None => {
                self.db.mark_product_unavailable(product.id)?;
                info!(product_id = product.id, "Not found in catalog");
                Ok(false)
            }
        }
    }

    /// Enrich products one after another
    ///
    /// A failure is counted and the run continues with the next product.
    pub async fn enrich_batch(&self, products: &[Product]) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        if products.is_empty() {
            return summary;
        }

        info!(count = products.len(), "Enriching products");

        for (index, product) in products.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.enrich(product).await {
                Ok(true) => summary.enriched += 1,
                Ok(false) => summary.not_found += 1,
                Err(e) => {
                    warn!(product_id = product.id, name = %product.name, error = %e, "Enrichment failed");
                    summary.errors += 1;
                }
            }
        }

        info!(
            enriched = summary.enriched,
            not_found = summary.not_found,
            errors = summary.errors,
            "Enrichment complete"
        );
        summary
    }

    async fn find_in_catalog(&self, product: &Product) -> Result<Option<CatalogProduct>> {
        let store_id = self.store_id.as_deref();

        if let Some(code) = product.external_id.as_deref() {
            if let Some(found) = self.catalog.fetch_product_by_code(code, store_id).await? {
                return Ok(Some(found));
            }
        }

        let documents = self
            .catalog
            .search_products(&product.name, store_id, 1, SEARCH_PAGE_SIZE)
            .await?;

        Ok(find_best_match(&documents, &product.name).cloned())
    }
}

/// Pick the search result that names the same product
pub fn find_best_match<'d>(
    documents: &'d [CatalogProduct],
    target_name: &str,
) -> Option<&'d CatalogProduct> {
    let target = normalize_name(target_name);
    let doc_name = |doc: &CatalogProduct| normalize_name(doc.name.as_deref().unwrap_or(""));

    if let Some(exact) = documents.iter().find(|doc| doc_name(doc) == target) {
        return Some(exact);
    }

    if let Some(partial) = documents.iter().find(|doc| {
        let name = doc_name(doc);
        !name.is_empty() && (name.contains(&target) || target.contains(&name))
    }) {
        return Some(partial);
    }

    match documents {
        [only] if similarity(&target, &doc_name(only)) > SIMILARITY_THRESHOLD => Some(only),
        _ => None,
    }
}

/// Lowercase, drop punctuation (keeping accented letters), collapse whitespace
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    collapse_whitespace(&cleaned)
}

/// Word-overlap similarity between two normalized names
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    let set_b: HashSet<&str> = words_b.iter().copied().collect();
    let common = words_a
        .iter()
        .copied()
        .collect::<HashSet<&str>>()
        .intersection(&set_b)
        .count();

    common as f64 / words_a.len().max(words_b.len()) as f64
}

/// In-process catalog for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    pub products: Vec<CatalogProduct>,
    /// Codes or queries whose lookup fails with an API error
    pub failing: HashSet<String>,
}

impl MockCatalog {
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        Self {
            products,
            failing: HashSet::new(),
        }
    }

    /// Make lookups for `key` (a code or a search query) fail
    pub fn fail_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }
}

#[async_trait]
impl CatalogLookup for MockCatalog {
    async fn fetch_product_by_code(
        &self,
        code: &str,
        _store_id: Option<&str>,
    ) -> Result<Option<CatalogProduct>> {
        if self.failing.contains(code) {
            return Err(Error::Api(format!("lookup failed for {}", code)));
        }
        Ok(self
            .products
            .iter()
            .find(|p| p.product_internal_code.as_deref() == Some(code))
            .cloned())
    }

    async fn search_products(
        &self,
        query: &str,
        _store_id: Option<&str>,
        _page: u32,
        size: u32,
    ) -> Result<Vec<CatalogProduct>> {
        if self.failing.contains(query) {
            return Err(Error::Api(format!("search failed for {}", query)));
        }
        Ok(self
            .products
            .iter()
            .filter(|p| {
                let name = p.name.as_deref().unwrap_or("");
                !name.is_empty() && (contains_folded(name, query) || contains_folded(query, name))
            })
            .take(size as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> CatalogProduct {
        CatalogProduct {
            name: Some(name.to_string()),
            ..CatalogProduct::default()
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Iogurte  Grego, Natural! "), "iogurte grego natural");
        assert_eq!(normalize_name("Maçã Gala"), "maçã gala");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("a b", "a b"), 1.0);
        assert_eq!(similarity("", "a"), 0.0);
        assert!((similarity("leite meio gordo", "leite gordo uht") - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_match_prefers_exact() {
        let docs = vec![doc("Leite Meio Gordo 1L Pack"), doc("Leite Meio Gordo")];
        let found = find_best_match(&docs, "LEITE MEIO GORDO!").map(|d| d.name.clone());
        assert_eq!(found, Some(Some("Leite Meio Gordo".to_string())));

        let found = find_best_match(&docs, "Leite Meio").map(|d| d.name.clone());
        assert_eq!(found, Some(Some("Leite Meio Gordo 1L Pack".to_string())));

        assert!(find_best_match(&docs, "Azeite Virgem").is_none());
    }

    #[test]
    fn test_best_match_single_similar_result() {
        let docs = vec![doc("Queijo Flamengo Fatias Pingo Doce")];
        assert!(find_best_match(&docs, "Queijo Flamengo Fatias Doce").is_some());

        let docs = vec![doc("Detergente Loiça Limão")];
        assert!(find_best_match(&docs, "Queijo Flamengo").is_none());
        assert!(find_best_match(&[], "Queijo").is_none());
    }
}
