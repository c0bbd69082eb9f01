//! Import of JSON transaction dumps
//!
//! A dump directory holds `transactions.json`: an object keyed by
//! transaction id, each value a transaction summary with an optional
//! `details` object (the transaction details payload).

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::db::Database;
use crate::error::{Error, Result};

pub const DUMP_FILE: &str = "transactions.json";

/// Counters for one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub transactions: usize,
    /// Product lines in the imported details payloads
    pub products: usize,
    /// Transactions already stored
    pub skipped: usize,
}

/// Ingest every transaction in `<dir>/transactions.json` not already stored
pub fn import_json_dump(db: &Database, dir: &Path) -> Result<ImportStats> {
    let path = dir.join(DUMP_FILE);
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "{} not found in {}",
            DUMP_FILE,
            dir.display()
        )));
    }

    let content = fs::read_to_string(&path)?;
    let dump: Value = serde_json::from_str(&content)?;
    let Value::Object(entries) = dump else {
        return Err(Error::Validation(format!(
            "{} must be an object keyed by transaction id",
            DUMP_FILE
        )));
    };

    let mut stats = ImportStats::default();

    for (transaction_id, mut data) in entries {
        if db.transaction_exists(&transaction_id)? {
            stats.skipped += 1;
            continue;
        }

        // The key is authoritative when the summary omits its own id
        if let Value::Object(summary) = &mut data {
            summary
                .entry("transactionId")
                .or_insert_with(|| Value::String(transaction_id.clone()));
        }

        let details = data.get("details");
        let product_count = details
            .and_then(|d| d.get("products"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        db.ingest_value(&data, details)?;

        stats.transactions += 1;
        stats.products += product_count;
        info!(transaction_id = %transaction_id, products = product_count, "Imported transaction");
    }

    info!(
        transactions = stats.transactions,
        products = stats.products,
        skipped = stats.skipped,
        "Import finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_dump(dir: &Path, dump: &Value) {
        fs::write(dir.join(DUMP_FILE), dump.to_string()).unwrap();
    }

    #[test]
    fn test_import_missing_file() {
        let db = Database::in_memory().unwrap();
        let dir = TempDir::new().unwrap();

        let err = import_json_dump(&db, dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_import_skips_known_transactions() {
        let db = Database::in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        write_dump(
            dir.path(),
            &json!({
                "T1": {
                    "transactionId": "T1",
                    "transactionDate": "2024-03-01T10:00:00",
                    "storeId": "S1",
                    "storeName": "Pingo Doce Lisboa",
                    "total": "12,40",
                    "details": {
                        "products": [
                            {"productId": "P1", "name": "Leite", "purchaseQuantity": 2, "purchasePrice": 0.89},
                            {"productId": "P2", "name": "Pão", "purchaseQuantity": 1, "purchasePrice": 1.2}
                        ]
                    }
                },
                "T2": {
                    "transactionDate": "2024-03-02T10:00:00",
                    "total": 5.0
                }
            }),
        );

        let stats = import_json_dump(&db, dir.path()).unwrap();
        assert_eq!(
            stats,
            ImportStats {
                transactions: 2,
                products: 2,
                skipped: 0
            }
        );
        assert!(db.transaction_exists("T2").unwrap());

        let again = import_json_dump(&db, dir.path()).unwrap();
        assert_eq!(again.transactions, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(db.stats().unwrap().total_transactions, 2);
    }

    #[test]
    fn test_import_rejects_non_object_dump() {
        let db = Database::in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        write_dump(dir.path(), &json!([{"transactionId": "T1"}]));

        let err = import_json_dump(&db, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
