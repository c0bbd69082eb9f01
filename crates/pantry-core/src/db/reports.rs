//! Spending reports, price trends and store-wide stats
//!
//! Ranked lists sort by amount (or quantity) descending, then by name so
//! equal values come out in a stable order.

use std::collections::HashMap;

use chrono::{Local, NaiveDate, TimeDelta};
use rusqlite::params;

use super::{parse_stored_date, Database};
use crate::error::{Error, Result};
use crate::models::{
    DateRange, PriceTrend, ProductQuantity, SpendingReport, Stats, StoreSpending,
    WeekdaySpending, UNKNOWN_STORE,
};
use crate::normalize::round_to;
use crate::text::contains_folded;

/// Number of products listed in a spending report
const TOP_PRODUCTS_LIMIT: usize = 10;

/// First day of a `days`-long window ending at `today`
///
/// Windows reaching past the earliest representable date start there.
pub(crate) fn window_start(today: NaiveDate, days: i64) -> Result<NaiveDate> {
    if days < 0 {
        return Err(Error::Validation(format!(
            "Day window must not be negative, got {}",
            days
        )));
    }
    Ok(TimeDelta::try_days(days)
        .and_then(|span| today.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN))
}

impl Database {
    /// Spending over the last `days` days, ending today
    pub fn spending_report(&self, days: i64) -> Result<SpendingReport> {
        self.spending_report_as_of(Local::now().date_naive(), days)
    }

    /// Spending over `[today - days, today]` (both ends inclusive)
    pub fn spending_report_as_of(&self, today: NaiveDate, days: i64) -> Result<SpendingReport> {
        let start = window_start(today, days)?;
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT t.total, t.transaction_date, s.name
             FROM transactions t
             LEFT JOIN stores s ON s.id = t.store_id
             WHERE date(t.transaction_date) BETWEEN ? AND ?
             ORDER BY t.transaction_date DESC",
        )?;
        let rows = stmt
            .query_map(params![start.to_string(), today.to_string()], |row| {
                Ok((
                    row.get::<_, Option<f64>>(0)?,
                    parse_stored_date(row.get(1)?),
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(SpendingReport {
                period_days: days,
                message: Some(format!("No transactions found in the last {} days", days)),
                ..SpendingReport::default()
            });
        }

        let total: f64 = rows.iter().map(|(t, _, _)| t.unwrap_or(0.0)).sum();
        let count = rows.len() as i64;

        let mut by_store: HashMap<String, f64> = HashMap::new();
        let mut by_day: HashMap<String, f64> = HashMap::new();
        for (amount, date, store) in &rows {
            let amount = amount.unwrap_or(0.0);
            let store = store.clone().unwrap_or_else(|| UNKNOWN_STORE.to_string());
            *by_store.entry(store).or_default() += amount;
            if let Some(date) = date {
                *by_day.entry(date.format("%A").to_string()).or_default() += amount;
            }
        }

        let mut qty_stmt = conn.prepare(
            "SELECT p.name, pu.quantity
             FROM purchases pu
             JOIN products p ON p.id = pu.product_id
             JOIN transactions t ON t.id = pu.transaction_id
             WHERE date(t.transaction_date) BETWEEN ? AND ?",
        )?;
        let mut quantities: HashMap<String, f64> = HashMap::new();
        let lines = qty_stmt.query_map(params![start.to_string(), today.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
        })?;
        for line in lines {
            let (name, quantity) = line?;
            // Lines without a usable quantity count as one unit
            let quantity = quantity.filter(|q| *q != 0.0).unwrap_or(1.0);
            *quantities.entry(name).or_default() += quantity;
        }

        let mut by_store: Vec<StoreSpending> = by_store
            .into_iter()
            .map(|(store, amount)| StoreSpending {
                store,
                amount: round_to(amount, 2),
            })
            .collect();
        by_store.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.store.cmp(&b.store)));

        let mut by_day: Vec<WeekdaySpending> = by_day
            .into_iter()
            .map(|(day, amount)| WeekdaySpending {
                day,
                amount: round_to(amount, 2),
            })
            .collect();
        by_day.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.day.cmp(&b.day)));

        let mut top_products: Vec<ProductQuantity> = quantities
            .into_iter()
            .map(|(name, quantity)| ProductQuantity {
                name,
                quantity: round_to(quantity, 3),
            })
            .collect();
        top_products.sort_by(|a, b| {
            b.quantity
                .total_cmp(&a.quantity)
                .then_with(|| a.name.cmp(&b.name))
        });
        top_products.truncate(TOP_PRODUCTS_LIMIT);

        Ok(SpendingReport {
            period_days: days,
            message: None,
            total_spent: Some(round_to(total, 2)),
            transaction_count: Some(count),
            average_per_transaction: Some(round_to(total / count as f64, 2)),
            by_store: Some(by_store),
            by_day_of_week: Some(by_day),
            top_products: Some(top_products),
        })
    }

    /// First-vs-last unit price per product
    ///
    /// With a filter, candidates are products whose name contains it
    /// (ignoring case and accents); without one, every product bought at
    /// least twice. Products with fewer than two priced purchases are left
    /// out. Results are ordered by product name.
    pub fn price_trends(&self, filter: Option<&str>) -> Result<Vec<PriceTrend>> {
        let conn = self.conn()?;

        let candidates: Vec<(i64, String)> = match filter {
            Some(pattern) => {
                let mut stmt = conn.prepare("SELECT id, name FROM products")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<Vec<(i64, String)>, _>>()?;
                rows.into_iter()
                    .filter(|(_, name)| contains_folded(name, pattern))
                    .collect()
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT p.id, p.name
                     FROM products p
                     JOIN purchases pu ON pu.product_id = p.id
                     GROUP BY p.id
                     HAVING COUNT(pu.id) >= 2",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        let mut purchases_stmt = conn.prepare(
            "SELECT price, purchase_date
             FROM purchases
             WHERE product_id = ?
             ORDER BY purchase_date IS NULL, purchase_date, id",
        )?;

        let mut trends = Vec::new();
        for (product_id, name) in candidates {
            let purchases = purchases_stmt
                .query_map(params![product_id], |row| {
                    Ok((row.get::<_, Option<f64>>(0)?, parse_stored_date(row.get(1)?)))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let total_purchases = purchases.len() as i64;
            let priced: Vec<_> = purchases
                .into_iter()
                .filter_map(|(price, date)| price.map(|p| (p, date)))
                .collect();

            let (Some(first), Some(last)) = (priced.first(), priced.last()) else {
                continue;
            };
            if priced.len() < 2 {
                continue;
            }

            let change = last.0 - first.0;
            let percent_change = if first.0 == 0.0 {
                0.0
            } else {
                round_to(change / first.0 * 100.0, 1)
            };

            trends.push(PriceTrend {
                product_id,
                name,
                first_seen: first.1,
                first_price: first.0,
                last_seen: last.1,
                last_price: last.0,
                price_change: round_to(change, 2),
                percent_change,
                total_purchases,
            });
        }

        trends.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
        Ok(trends)
    }

    /// Store-wide counters; all zero when nothing has been ingested
    pub fn stats(&self) -> Result<Stats> {
        let conn = self.conn()?;

        let (count, earliest, latest, total): (i64, Option<String>, Option<String>, Option<f64>) =
            conn.query_row(
                "SELECT COUNT(*), MIN(transaction_date), MAX(transaction_date), SUM(total)
                 FROM transactions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        if count == 0 {
            return Ok(Stats::default());
        }

        let total_products: i64 =
            conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;

        Ok(Stats {
            total_transactions: count,
            total_products,
            date_range: DateRange {
                earliest: parse_stored_date(earliest),
                latest: parse_stored_date(latest),
            },
            total_spent: round_to(total.unwrap_or(0.0), 2),
        })
    }
}
