//! Catalog reconciliation: find-or-create for stores, brands and products,
//! and duplicate-suppressed purchase recording
//!
//! The free functions take a plain `Connection` so ingestion can run them
//! inside one SQLite transaction. The `Database` methods wrap each call in
//! its own transaction for standalone use.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{parse_stored_date, parse_timestamp, reconcile_err, Database};
use crate::error::Result;
use crate::models::{Brand, NewProduct, NewPurchase, Product, Store, UNKNOWN_STORE};
use crate::normalize::format_datetime;

/// Result of recording a purchase line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseInsertResult {
    /// New purchase row, contains its ID
    Inserted(i64),
    /// A row for this (product, transaction) pair already existed, contains its ID
    Duplicate(i64),
}

pub(crate) const PRODUCT_COLUMNS: &str = "id, external_id, name, category, category_id, brand_id, \
     image, first_seen, ean, description_html, ingredients, store_price, enrichment_status, \
     last_enriched_at, created_at";

/// Find a store by retailer id, creating it on first sight
///
/// The only update ever applied is a name backfill for stores first
/// recorded without a name.
pub(crate) fn find_or_create_store(
    conn: &Connection,
    external_id: &str,
    name: Option<&str>,
) -> Result<Store> {
    let existing = conn
        .query_row(
            "SELECT id, external_id, name, created_at FROM stores WHERE external_id = ?",
            params![external_id],
            row_to_store,
        )
        .optional()?;

    if let Some(mut store) = existing {
        if let Some(name) = name.filter(|n| *n != UNKNOWN_STORE) {
            if store.name == UNKNOWN_STORE {
                conn.execute(
                    "UPDATE stores SET name = ? WHERE id = ?",
                    params![name, store.id],
                )?;
                debug!(store_id = store.id, name = %name, "Backfilled store name");
                store.name = name.to_string();
            }
        }
        return Ok(store);
    }

    conn.execute(
        "INSERT INTO stores (external_id, name) VALUES (?, ?)",
        params![external_id, name.unwrap_or(UNKNOWN_STORE)],
    )
    .map_err(|e| reconcile_err("store", e))?;
    let id = conn.last_insert_rowid();
    debug!(store_id = id, external_id = %external_id, "Created store");

    Ok(conn.query_row(
        "SELECT id, external_id, name, created_at FROM stores WHERE id = ?",
        params![id],
        row_to_store,
    )?)
}

/// Find a brand by retailer id (or by name among id-less brands)
///
/// Returns `None` when the payload carried neither id nor name.
pub(crate) fn find_or_create_brand(
    conn: &Connection,
    external_id: Option<&str>,
    name: Option<&str>,
    own_brand: bool,
    logo: Option<&str>,
) -> Result<Option<Brand>> {
    let existing = match (external_id, name) {
        (None, None) => return Ok(None),
        (Some(ext), _) => conn
            .query_row(
                "SELECT id, external_id, name, own_brand, logo, created_at
                 FROM brands WHERE external_id = ?",
                params![ext],
                row_to_brand,
            )
            .optional()?,
        (None, Some(name)) => conn
            .query_row(
                "SELECT id, external_id, name, own_brand, logo, created_at
                 FROM brands WHERE external_id IS NULL AND name = ?
                 ORDER BY id LIMIT 1",
                params![name],
                row_to_brand,
            )
            .optional()?,
    };

    if let Some(brand) = existing {
        return Ok(Some(brand));
    }

    conn.execute(
        "INSERT INTO brands (external_id, name, own_brand, logo) VALUES (?, ?, ?, ?)",
        params![external_id, name.unwrap_or("Unknown"), own_brand, logo],
    )
    .map_err(|e| reconcile_err("brand", e))?;
    let id = conn.last_insert_rowid();

    Ok(Some(conn.query_row(
        "SELECT id, external_id, name, own_brand, logo, created_at FROM brands WHERE id = ?",
        params![id],
        row_to_brand,
    )?))
}

/// Resolve a product: by external id, then by (name, brand), else create
pub(crate) fn find_or_create_product(conn: &Connection, product: &NewProduct) -> Result<Product> {
    if let Some(ext) = product.external_id.as_deref() {
        let existing = conn
            .query_row(
                &format!("SELECT {} FROM products WHERE external_id = ?", PRODUCT_COLUMNS),
                params![ext],
                row_to_product,
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok(existing);
        }
    }

    // `IS` so that a missing brand only matches brandless products
    let existing = conn
        .query_row(
            &format!(
                "SELECT {} FROM products WHERE name = ? AND brand_id IS ? ORDER BY id LIMIT 1",
                PRODUCT_COLUMNS
            ),
            params![product.name, product.brand_id],
            row_to_product,
        )
        .optional()?;
    if let Some(existing) = existing {
        return Ok(existing);
    }

    conn.execute(
        "INSERT INTO products (external_id, name, category, category_id, brand_id, image, first_seen)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            product.external_id,
            product.name,
            product.category,
            product.category_id,
            product.brand_id,
            product.image,
            product.first_seen.as_ref().map(format_datetime),
        ],
    )
    .map_err(|e| reconcile_err("product", e))?;
    let id = conn.last_insert_rowid();
    debug!(product_id = id, name = %product.name, "Created product");

    Ok(conn.query_row(
        &format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS),
        params![id],
        row_to_product,
    )?)
}

/// Record a purchase line unless one exists for the same (product, transaction)
pub(crate) fn record_purchase(
    conn: &Connection,
    purchase: &NewPurchase,
) -> Result<PurchaseInsertResult> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM purchases WHERE product_id = ? AND transaction_id = ?",
            params![purchase.product_id, purchase.transaction_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(PurchaseInsertResult::Duplicate(id));
    }

    conn.execute(
        "INSERT INTO purchases (product_id, transaction_id, store_id, quantity, price, total, purchase_date)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            purchase.product_id,
            purchase.transaction_id,
            purchase.store_id,
            purchase.quantity,
            purchase.price,
            purchase.total,
            purchase.purchase_date.as_ref().map(format_datetime),
        ],
    )
    .map_err(|e| reconcile_err("purchase", e))?;

    Ok(PurchaseInsertResult::Inserted(conn.last_insert_rowid()))
}

pub(crate) fn row_to_store(row: &rusqlite::Row) -> rusqlite::Result<Store> {
    let created_at: String = row.get(3)?;
    Ok(Store {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_brand(row: &rusqlite::Row) -> rusqlite::Result<Brand> {
    let created_at: String = row.get(5)?;
    Ok(Brand {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        own_brand: row.get(3)?,
        logo: row.get(4)?,
        created_at: parse_timestamp(&created_at),
    })
}

/// Map a row selected with `PRODUCT_COLUMNS`
pub(crate) fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    let status: Option<String> = row.get(12)?;
    let last_enriched_at: Option<String> = row.get(13)?;
    let created_at: String = row.get(14)?;

    Ok(Product {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        category_id: row.get(4)?,
        brand_id: row.get(5)?,
        image: row.get(6)?,
        first_seen: parse_stored_date(row.get(7)?),
        ean: row.get(8)?,
        description_html: row.get(9)?,
        ingredients: row.get(10)?,
        store_price: row.get(11)?,
        enrichment_status: status.and_then(|s| s.parse().ok()),
        last_enriched_at: last_enriched_at.as_deref().map(parse_timestamp),
        created_at: parse_timestamp(&created_at),
    })
}

impl Database {
    /// Find or create a store in its own transaction
    pub fn find_or_create_store(&self, external_id: &str, name: Option<&str>) -> Result<Store> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let store = find_or_create_store(&tx, external_id, name)?;
        tx.commit()?;
        Ok(store)
    }

    /// Find or create a brand in its own transaction
    pub fn find_or_create_brand(
        &self,
        external_id: Option<&str>,
        name: Option<&str>,
        own_brand: bool,
        logo: Option<&str>,
    ) -> Result<Option<Brand>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let brand = find_or_create_brand(&tx, external_id, name, own_brand, logo)?;
        tx.commit()?;
        Ok(brand)
    }

    /// Find or create a product in its own transaction
    pub fn find_or_create_product(&self, product: &NewProduct) -> Result<Product> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let product = find_or_create_product(&tx, product)?;
        tx.commit()?;
        Ok(product)
    }

    /// Record a purchase line in its own transaction
    pub fn record_purchase(&self, purchase: &NewPurchase) -> Result<PurchaseInsertResult> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let result = record_purchase(&tx, purchase)?;
        tx.commit()?;
        Ok(result)
    }
}
