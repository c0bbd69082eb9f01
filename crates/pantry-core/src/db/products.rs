//! Product lookups and enrichment writes

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::catalog::{row_to_product, PRODUCT_COLUMNS};
use super::{parse_timestamp, Database};
use crate::error::{Error, Result};
use crate::models::{CatalogProduct, EnrichmentStatus, Product, ProductNutrition};
use crate::nutrition::{self, NutritionFacts};
use crate::text::contains_folded;

impl Database {
    /// Get a product by row id
    pub fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                &format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS),
                params![id],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    /// Find a product by retailer catalog id
    pub fn find_product_by_external_id(&self, external_id: &str) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                &format!("SELECT {} FROM products WHERE external_id = ?", PRODUCT_COLUMNS),
                params![external_id],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    /// Find a product by barcode
    pub fn find_product_by_ean(&self, ean: &str) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                &format!(
                    "SELECT {} FROM products WHERE ean = ? ORDER BY id LIMIT 1",
                    PRODUCT_COLUMNS
                ),
                params![ean],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    /// List all products ordered by name
    pub fn list_products(&self) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products ORDER BY name, id",
            PRODUCT_COLUMNS
        ))?;
        let products = stmt
            .query_map([], row_to_product)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Products whose name contains `pattern`, ignoring case and accents
    pub fn search_products(&self, pattern: &str) -> Result<Vec<Product>> {
        Ok(self
            .list_products()?
            .into_iter()
            .filter(|p| contains_folded(&p.name, pattern))
            .collect())
    }

    /// Products never enriched, or queued for enrichment
    pub fn products_needing_enrichment(&self, limit: usize) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products
             WHERE enrichment_status IS NULL OR enrichment_status = ?
             ORDER BY id
             LIMIT ?",
            PRODUCT_COLUMNS
        ))?;
        let products = stmt
            .query_map(
                params![EnrichmentStatus::Pending.as_str(), limit as i64],
                row_to_product,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Apply catalog data to a product and store its nutrition facts
    ///
    /// The description is parsed for a full nutrition label only when it has
    /// one; otherwise just the ingredients list is extracted. Returns the
    /// facts that were read.
    pub fn enrich_product(
        &self,
        product_id: i64,
        catalog: &CatalogProduct,
    ) -> Result<NutritionFacts> {
        let description = catalog.description.as_deref();
        let facts = match description {
            Some(html) if nutrition::has_nutrition_data(Some(html)) => {
                nutrition::parse(Some(html))
            }
            Some(html) => NutritionFacts {
                ingredients: nutrition::extract_ingredients(html),
                ..NutritionFacts::default()
            },
            None => NutritionFacts::default(),
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE products
             SET ean = ?, description_html = ?, store_price = ?,
                 enrichment_status = ?, last_enriched_at = CURRENT_TIMESTAMP,
                 image = COALESCE(?, image)
             WHERE id = ?",
            params![
                catalog.ean,
                description,
                catalog.store_price,
                EnrichmentStatus::Enriched.as_str(),
                catalog.image,
                product_id,
            ],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("product {}", product_id)));
        }

        if description.is_some() {
            tx.execute(
                "UPDATE products SET ingredients = ? WHERE id = ?",
                params![facts.ingredients, product_id],
            )?;
        }

        if save_nutrition(&tx, product_id, &facts)? {
            debug!(product_id, "Stored nutrition facts");
        }

        tx.commit()?;
        info!(product_id, ean = ?catalog.ean, "Enriched product");
        Ok(facts)
    }

    /// Record that the catalog has no match for a product
    pub fn mark_product_unavailable(&self, product_id: i64) -> Result<()> {
        self.set_enrichment_status(product_id, EnrichmentStatus::Unavailable)
    }

    /// Set a product's enrichment status (e.g. queue it as pending)
    pub fn set_enrichment_status(&self, product_id: i64, status: EnrichmentStatus) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE products SET enrichment_status = ?, last_enriched_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![status.as_str(), product_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("product {}", product_id)));
        }
        Ok(())
    }

    /// Get stored nutrition facts for a product
    pub fn get_product_nutrition(&self, product_id: i64) -> Result<Option<ProductNutrition>> {
        let conn = self.conn()?;
        let nutrition = conn
            .query_row(
                "SELECT id, product_id, energy_kj, energy_kcal, fat, saturated_fat,
                        carbohydrates, sugars, fiber, protein, salt, created_at
                 FROM product_nutritions WHERE product_id = ?",
                params![product_id],
                |row| {
                    let created_at: String = row.get(11)?;
                    Ok(ProductNutrition {
                        id: row.get(0)?,
                        product_id: row.get(1)?,
                        energy_kj: row.get(2)?,
                        energy_kcal: row.get(3)?,
                        fat: row.get(4)?,
                        saturated_fat: row.get(5)?,
                        carbohydrates: row.get(6)?,
                        sugars: row.get(7)?,
                        fiber: row.get(8)?,
                        protein: row.get(9)?,
                        salt: row.get(10)?,
                        created_at: parse_timestamp(&created_at),
                    })
                },
            )
            .optional()?;
        Ok(nutrition)
    }
}

/// Upsert nutrition facts; skipped unless energy or protein was read
fn save_nutrition(conn: &Connection, product_id: i64, facts: &NutritionFacts) -> Result<bool> {
    if !facts.has_core_values() {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO product_nutritions
         (product_id, energy_kj, energy_kcal, fat, saturated_fat, carbohydrates,
          sugars, fiber, protein, salt)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(product_id) DO UPDATE SET
            energy_kj = excluded.energy_kj,
            energy_kcal = excluded.energy_kcal,
            fat = excluded.fat,
            saturated_fat = excluded.saturated_fat,
            carbohydrates = excluded.carbohydrates,
            sugars = excluded.sugars,
            fiber = excluded.fiber,
            protein = excluded.protein,
            salt = excluded.salt,
            updated_at = CURRENT_TIMESTAMP",
        params![
            product_id,
            facts.energy_kj,
            facts.energy_kcal,
            facts.fat,
            facts.saturated_fat,
            facts.carbohydrates,
            facts.sugars,
            facts.fiber,
            facts.protein,
            facts.salt,
        ],
    )?;

    Ok(true)
}
