//! Transaction ingestion and reads
//!
//! `ingest` is the only writer for transactions and purchases. One call is
//! one SQLite transaction: store, transaction row, brands, products and
//! purchases either all land or none do.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::catalog::{
    find_or_create_brand, find_or_create_product, find_or_create_store, record_purchase,
    row_to_store, PurchaseInsertResult,
};
use super::{parse_stored_date, parse_timestamp, reconcile_err, Database};
use crate::error::{Error, Result};
use crate::models::{
    IngestOutcome, NewProduct, NewPurchase, ProductLine, PurchaseLine, Transaction,
    TransactionDetail, TransactionDetails, TransactionListItem, TransactionSummary,
};
use crate::normalize::{format_datetime, parse_datetime, round_to};

const TRANSACTION_COLUMNS: &str = "id, transaction_id, store_id, total_items, total_discount, \
     total, transaction_date, details, saved_at";

/// Payload checked and parsed ahead of any write
struct ValidatedPayload<'a> {
    transaction_id: &'a str,
    details: Option<(TransactionDetails, String)>,
}

fn validate<'a>(
    summary: &'a TransactionSummary,
    details: Option<&Value>,
) -> Result<ValidatedPayload<'a>> {
    let transaction_id = summary
        .transaction_id
        .as_deref()
        .ok_or_else(|| Error::Validation("missing transactionId".to_string()))?;

    let details = match details {
        None | Some(Value::Null) => None,
        Some(value @ Value::Object(_)) => {
            let parsed = TransactionDetails::deserialize(value).map_err(|e| {
                Error::Validation(format!("transaction {} details: {}", transaction_id, e))
            })?;

            if let Some(index) = parsed
                .products
                .iter()
                .flatten()
                .position(|line| line.name.is_none())
            {
                return Err(Error::Validation(format!(
                    "transaction {} product line {} has no name",
                    transaction_id, index
                )));
            }

            Some((parsed, value.to_string()))
        }
        Some(_) => {
            return Err(Error::Validation(format!(
                "transaction {} details must be a JSON object",
                transaction_id
            )))
        }
    };

    Ok(ValidatedPayload {
        transaction_id,
        details,
    })
}

impl Database {
    /// Ingest a transaction summary and its optional details payload
    ///
    /// Re-ingesting a known transaction refreshes its details blob and
    /// `saved_at` without duplicating any purchase row.
    pub fn ingest(
        &self,
        summary: &TransactionSummary,
        details: Option<&Value>,
    ) -> Result<IngestOutcome> {
        let payload = validate(summary, details)?;
        let transaction_id = payload.transaction_id;

        let outcome = self
            .ingest_atomic(summary, &payload)
            .map_err(|e| Error::storage(transaction_id, e))?;

        info!(
            transaction_id = %transaction_id,
            created = outcome.created,
            inserted = outcome.purchases_inserted,
            skipped = outcome.purchases_skipped,
            "Saved transaction"
        );
        Ok(outcome)
    }

    fn ingest_atomic(
        &self,
        summary: &TransactionSummary,
        payload: &ValidatedPayload<'_>,
    ) -> Result<IngestOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let outcome = ingest_unit(&tx, summary, payload)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Ingest raw JSON payloads (summary object plus optional details)
    pub fn ingest_value(&self, summary: &Value, details: Option<&Value>) -> Result<IngestOutcome> {
        let summary = TransactionSummary::from_value(summary)?;
        self.ingest(&summary, details)
    }

    /// Check whether a retailer transaction id is already stored
    pub fn transaction_exists(&self, transaction_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE transaction_id = ?)",
            params![transaction_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Get a stored transaction with its store and purchase lines
    pub fn get_transaction(&self, transaction_id: &str) -> Result<Option<TransactionDetail>> {
        let conn = self.conn()?;

        let transaction = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE transaction_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![transaction_id],
                row_to_transaction,
            )
            .optional()?;

        let Some(transaction) = transaction else {
            return Ok(None);
        };

        let store = match transaction.store_id {
            Some(store_id) => conn
                .query_row(
                    "SELECT id, external_id, name, created_at FROM stores WHERE id = ?",
                    params![store_id],
                    row_to_store,
                )
                .optional()?,
            None => None,
        };

        let mut stmt = conn.prepare(
            "SELECT pu.product_id, p.name, pu.quantity, pu.price, pu.total
             FROM purchases pu
             JOIN products p ON p.id = pu.product_id
             WHERE pu.transaction_id = ?
             ORDER BY pu.id",
        )?;
        let purchases = stmt
            .query_map(params![transaction.id], |row| {
                Ok(PurchaseLine {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    quantity: row.get(2)?,
                    price: row.get(3)?,
                    total: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let details = transaction
            .details
            .as_deref()
            .and_then(|d| serde_json::from_str(d).ok());

        Ok(Some(TransactionDetail {
            transaction,
            store,
            purchases,
            details,
        }))
    }

    /// List stored transactions, newest first
    pub fn list_transactions(&self, limit: Option<usize>) -> Result<Vec<TransactionListItem>> {
        let conn = self.conn()?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(
            "SELECT t.transaction_id, t.transaction_date, s.name, t.total, t.total_items
             FROM transactions t
             LEFT JOIN stores s ON s.id = t.store_id
             ORDER BY t.transaction_date DESC, t.id DESC
             LIMIT ?",
        )?;

        let items = stmt
            .query_map(params![limit], |row| {
                Ok(TransactionListItem {
                    transaction_id: row.get(0)?,
                    transaction_date: parse_stored_date(row.get(1)?),
                    store_name: row.get(2)?,
                    total: row.get(3)?,
                    total_items: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }
}

/// All writes for one transaction; the caller owns the SQLite transaction
fn ingest_unit(
    conn: &Connection,
    summary: &TransactionSummary,
    payload: &ValidatedPayload<'_>,
) -> Result<IngestOutcome> {
    let transaction_date = summary.transaction_date.as_deref().and_then(parse_datetime);

    let store = match summary.store_id.as_deref() {
        Some(store_id) => Some(find_or_create_store(
            conn,
            store_id,
            summary.store_name.as_deref(),
        )?),
        None => None,
    };
    let store_id = store.as_ref().map(|s| s.id);

    let details_blob = payload.details.as_ref().map(|(_, blob)| blob.as_str());
    let (transaction, created) =
        upsert_transaction(conn, summary, payload.transaction_id, store_id, details_blob)?;

    let mut outcome = IngestOutcome {
        transaction,
        created,
        purchases_inserted: 0,
        purchases_skipped: 0,
    };

    let lines = payload
        .details
        .as_ref()
        .and_then(|(details, _)| details.products.as_ref());

    for line in lines.into_iter().flatten() {
        match save_line(conn, line, outcome.transaction.id, store_id, transaction_date)? {
            PurchaseInsertResult::Inserted(_) => outcome.purchases_inserted += 1,
            PurchaseInsertResult::Duplicate(id) => {
                debug!(purchase_id = id, "Purchase already recorded");
                outcome.purchases_skipped += 1;
            }
        }
    }

    Ok(outcome)
}

fn upsert_transaction(
    conn: &Connection,
    summary: &TransactionSummary,
    transaction_id: &str,
    store_id: Option<i64>,
    details: Option<&str>,
) -> Result<(Transaction, bool)> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM transactions WHERE transaction_id = ?",
            params![transaction_id],
            |row| row.get(0),
        )
        .optional()?;

    let (id, created) = match existing {
        Some(id) => {
            // Keep the stored blob when this payload carries no details
            conn.execute(
                "UPDATE transactions
                 SET details = COALESCE(?, details), saved_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                params![details, id],
            )?;
            (id, false)
        }
        None => {
            conn.execute(
                "INSERT INTO transactions
                 (transaction_id, store_id, total_items, total_discount, total, transaction_date, details)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    transaction_id,
                    store_id,
                    summary.total_items,
                    summary.total_discount.map(|d| round_to(d, 2)),
                    summary.total.map(|t| round_to(t, 2)),
                    summary
                        .transaction_date
                        .as_deref()
                        .and_then(parse_datetime)
                        .as_ref()
                        .map(format_datetime),
                    details,
                ],
            )
            .map_err(|e| reconcile_err("transaction", e))?;
            (conn.last_insert_rowid(), true)
        }
    };

    let transaction = conn.query_row(
        &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
        params![id],
        row_to_transaction,
    )?;

    Ok((transaction, created))
}

fn save_line(
    conn: &Connection,
    line: &ProductLine,
    transaction_row_id: i64,
    store_id: Option<i64>,
    transaction_date: Option<chrono::NaiveDateTime>,
) -> Result<PurchaseInsertResult> {
    let brand = match line.brand.as_ref() {
        Some(brand) => {
            let (external_id, name, own_brand, logo) = brand.parts();
            find_or_create_brand(conn, external_id, name, own_brand, logo)?
        }
        None => None,
    };

    let product = find_or_create_product(
        conn,
        &NewProduct {
            external_id: line.external_id().map(str::to_string),
            // Presence checked during validation
            name: line.name.clone().unwrap_or_default(),
            category: line.category.clone(),
            category_id: line.category_id.clone(),
            brand_id: brand.map(|b| b.id),
            image: line.image.clone(),
            first_seen: transaction_date,
        },
    )?;

    record_purchase(
        conn,
        &NewPurchase {
            product_id: product.id,
            transaction_id: transaction_row_id,
            store_id,
            quantity: line.purchase_quantity,
            price: line.purchase_price,
            total: line.total_amount,
            purchase_date: transaction_date,
        },
    )
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let saved_at: String = row.get(8)?;
    Ok(Transaction {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        store_id: row.get(2)?,
        total_items: row.get(3)?,
        total_discount: row.get(4)?,
        total: row.get(5)?,
        transaction_date: parse_stored_date(row.get(6)?),
        details: row.get(7)?,
        saved_at: parse_timestamp(&saved_at),
    })
}
