//! CSV export of transactions and products

use std::fs::File;
use std::io;
use std::path::Path;

use rusqlite::params;
use tracing::info;

use crate::db::Database;
use crate::error::Result;
use crate::normalize::round_to;

pub const TRANSACTIONS_CSV: &str = "transactions.csv";
pub const PRODUCTS_CSV: &str = "products.csv";

const TRANSACTION_HEADERS: [&str; 5] = ["Transaction ID", "Date", "Store", "Total", "Items Count"];
const PRODUCT_HEADERS: [&str; 5] = [
    "Product Name",
    "Category",
    "Total Purchases",
    "First Seen",
    "Avg Price",
];

fn opt_to_field<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl Database {
    /// Write all transactions as CSV, oldest first
    pub fn write_transactions_csv<W: io::Write>(&self, out: W) -> Result<usize> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.transaction_id, t.transaction_date, s.name, t.total, t.total_items
             FROM transactions t
             LEFT JOIN stores s ON s.id = t.store_id
             ORDER BY t.transaction_date, t.id",
        )?;

        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(TRANSACTION_HEADERS)?;

        let mut rows = stmt.query([])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            writer.write_record([
                row.get::<_, String>(0)?,
                opt_to_field(row.get::<_, Option<String>>(1)?),
                opt_to_field(row.get::<_, Option<String>>(2)?),
                opt_to_field(row.get::<_, Option<f64>>(3)?),
                opt_to_field(row.get::<_, Option<i64>>(4)?),
            ])?;
            count += 1;
        }

        writer.flush()?;
        Ok(count)
    }

    /// Write one row per product with purchase count and average unit price
    pub fn write_products_csv<W: io::Write>(&self, out: W) -> Result<usize> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.name, p.category, COUNT(pu.id), p.first_seen, AVG(pu.price)
             FROM products p
             LEFT JOIN purchases pu ON pu.product_id = p.id
             GROUP BY p.id
             ORDER BY p.name, p.id",
        )?;

        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(PRODUCT_HEADERS)?;

        let mut rows = stmt.query(params![])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let avg_price = row.get::<_, Option<f64>>(4)?.map_or(0.0, |p| round_to(p, 2));
            writer.write_record([
                row.get::<_, String>(0)?,
                opt_to_field(row.get::<_, Option<String>>(1)?),
                row.get::<_, i64>(2)?.to_string(),
                opt_to_field(row.get::<_, Option<String>>(3)?),
                avg_price.to_string(),
            ])?;
            count += 1;
        }

        writer.flush()?;
        Ok(count)
    }

    /// Write `transactions.csv` and `products.csv` into `dir`
    pub fn export_csv(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let transactions = self.write_transactions_csv(File::create(dir.join(TRANSACTIONS_CSV))?)?;
        let products = self.write_products_csv(File::create(dir.join(PRODUCTS_CSV))?)?;

        info!(
            transactions,
            products,
            dir = %dir.display(),
            "Exported {} and {}",
            TRANSACTIONS_CSV,
            PRODUCTS_CSV
        );
        Ok(())
    }
}
