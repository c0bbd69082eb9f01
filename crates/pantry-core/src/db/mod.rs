//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `catalog` - Store, brand and product reconciliation, purchase recording
//! - `transactions` - Atomic transaction ingestion and transaction reads
//! - `products` - Product lookups and enrichment writes
//! - `reports` - Spending reports, price trends and stats

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ErrorCode;
use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};
use crate::normalize::DATETIME_FORMAT;

mod catalog;
mod products;
mod reports;
mod transactions;

pub use catalog::PurchaseInsertResult;
pub(crate) use reports::window_start;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite timestamp (`CURRENT_TIMESTAMP`, always UTC)
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored wall-clock date (transaction and purchase dates)
pub(crate) fn parse_stored_date(s: Option<String>) -> Option<NaiveDateTime> {
    s.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok())
}

/// Map a constraint violation into a reconciliation error
pub(crate) fn reconcile_err(context: &str, e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
            Error::Reconciliation(format!(
                "{}: {}",
                context,
                msg.as_deref().unwrap_or("constraint violation")
            ))
        }
        _ => Error::Database(e),
    }
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    /// Scratch directory owned by `in_memory` databases; removed on last drop.
    /// Declared after `pool` so connections close first.
    _scratch: Option<Arc<TempDir>>,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            // Per-connection pragmas
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            _scratch: None,
        };
        db.run_migrations()?;

        debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a file in a temporary directory rather than `:memory:`
    /// because every pooled connection to `:memory:` would see its own empty
    /// database. The directory is deleted when the last clone is dropped.
    pub fn in_memory() -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("pantry_test_").tempdir()?;
        let path = scratch.path().join("pantry.db");

        let mut db = Self::new(&path.to_string_lossy())?;
        db._scratch = Some(Arc::new(scratch));
        Ok(db)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the ingest writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Stores (retailer locations)
            CREATE TABLE IF NOT EXISTS stores (
                id INTEGER PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Brands
            CREATE TABLE IF NOT EXISTS brands (
                id INTEGER PRIMARY KEY,
                external_id TEXT,
                name TEXT NOT NULL,
                own_brand INTEGER NOT NULL DEFAULT 0,
                logo TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_brands_external_id
                ON brands(external_id) WHERE external_id IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_brands_name ON brands(name);

            -- Transactions (one row per shopping trip)
            -- Dates are wall-clock text as the retailer expressed them
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                transaction_id TEXT NOT NULL UNIQUE,
                store_id INTEGER REFERENCES stores(id),
                total_items INTEGER,
                total_discount REAL,
                total REAL,
                transaction_date TEXT,
                details TEXT,
                saved_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(transaction_date);
            CREATE INDEX IF NOT EXISTS idx_transactions_store ON transactions(store_id);

            -- Products (catalog entries seen in purchases)
            -- enrichment_status: NULL (never tried), pending, enriched, unavailable
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                external_id TEXT,
                name TEXT NOT NULL,
                category TEXT,
                category_id TEXT,
                brand_id INTEGER REFERENCES brands(id),
                image TEXT,
                first_seen TEXT,
                ean TEXT,
                description_html TEXT,
                ingredients TEXT,
                store_price REAL,
                enrichment_status TEXT,
                last_enriched_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_products_external_id
                ON products(external_id) WHERE external_id IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
            CREATE INDEX IF NOT EXISTS idx_products_ean ON products(ean);
            CREATE INDEX IF NOT EXISTS idx_products_enrichment ON products(enrichment_status);

            -- Purchases (product lines of a transaction)
            CREATE TABLE IF NOT EXISTS purchases (
                id INTEGER PRIMARY KEY,
                product_id INTEGER NOT NULL REFERENCES products(id),
                transaction_id INTEGER NOT NULL REFERENCES transactions(id),
                store_id INTEGER REFERENCES stores(id),
                quantity REAL,
                price REAL,
                total REAL,
                purchase_date TEXT,
                UNIQUE(product_id, transaction_id)
            );

            CREATE INDEX IF NOT EXISTS idx_purchases_product ON purchases(product_id);
            CREATE INDEX IF NOT EXISTS idx_purchases_transaction ON purchases(transaction_id);
            CREATE INDEX IF NOT EXISTS idx_purchases_date ON purchases(purchase_date);

            -- Nutrition facts (one row per product, overwritten on enrichment)
            CREATE TABLE IF NOT EXISTS product_nutritions (
                id INTEGER PRIMARY KEY,
                product_id INTEGER NOT NULL UNIQUE REFERENCES products(id),
                energy_kj REAL,
                energy_kcal REAL,
                fat REAL,
                saturated_fat REAL,
                carbohydrates REAL,
                sugars REAL,
                fiber REAL,
                protein REAL,
                salt REAL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        Ok(())
    }
}
