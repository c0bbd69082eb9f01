//! Domain models for Pantry

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::normalize::de;

/// Placeholder name for stores whose name the payload did not carry
pub const UNKNOWN_STORE: &str = "Unknown Store";

/// A retailer store, keyed by the retailer's store id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A product brand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: i64,
    /// Retailer brand id; some payloads only carry a name
    pub external_id: Option<String>,
    pub name: String,
    /// Retailer's own label
    pub own_brand: bool,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Progress of catalog enrichment for a product (unset until first attempt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Pending,
    Enriched,
    Unavailable,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Enriched => "enriched",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::str::FromStr for EnrichmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "enriched" => Ok(Self::Enriched),
            "unavailable" => Ok(Self::Unavailable),
            _ => Err(format!("Unknown enrichment status: {}", s)),
        }
    }
}

impl std::fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A product known from purchase history, optionally enriched from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    /// Retailer catalog id (unique when present)
    pub external_id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<i64>,
    pub image: Option<String>,
    /// Date of the first transaction that contained this product
    pub first_seen: Option<NaiveDateTime>,
    pub ean: Option<String>,
    pub description_html: Option<String>,
    pub ingredients: Option<String>,
    pub store_price: Option<f64>,
    pub enrichment_status: Option<EnrichmentStatus>,
    pub last_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Product fields known at ingestion time
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub external_id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<i64>,
    pub image: Option<String>,
    pub first_seen: Option<NaiveDateTime>,
}

/// A persisted retailer transaction (one shopping trip)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// Retailer transaction id
    pub transaction_id: String,
    pub store_id: Option<i64>,
    pub total_items: Option<i64>,
    pub total_discount: Option<f64>,
    /// Total paid, rounded to cents
    pub total: Option<f64>,
    pub transaction_date: Option<NaiveDateTime>,
    /// Original details payload, serialized as received
    pub details: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// One product line of a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub product_id: i64,
    pub transaction_id: i64,
    pub store_id: Option<i64>,
    pub quantity: Option<f64>,
    /// Unit price
    pub price: Option<f64>,
    /// Line total
    pub total: Option<f64>,
    pub purchase_date: Option<NaiveDateTime>,
}

/// Purchase row to record during ingestion
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub product_id: i64,
    pub transaction_id: i64,
    pub store_id: Option<i64>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub total: Option<f64>,
    pub purchase_date: Option<NaiveDateTime>,
}

/// Stored nutrition values for a product (per 100g/100ml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductNutrition {
    pub id: i64,
    pub product_id: i64,
    pub energy_kj: Option<f64>,
    pub energy_kcal: Option<f64>,
    pub fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugars: Option<f64>,
    pub fiber: Option<f64>,
    pub protein: Option<f64>,
    pub salt: Option<f64>,
    pub created_at: DateTime<Utc>,
}

// ========== Retailer payloads ==========

/// Transaction summary as returned by the transaction history endpoint
///
/// Every field is optional at the type level; `transaction_id` is enforced
/// by ingestion so a missing id surfaces as a validation error instead of
/// a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    #[serde(default, deserialize_with = "de::id")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub transaction_date: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub store_id: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub store_name: Option<String>,
    #[serde(default, deserialize_with = "de::decimal")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "de::decimal")]
    pub total_discount: Option<f64>,
    #[serde(default, deserialize_with = "de::integer")]
    pub total_items: Option<i64>,
}

impl TransactionSummary {
    /// Read a summary from a raw JSON payload
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::Validation(
                "transaction summary must be a JSON object".to_string(),
            ));
        }
        Self::deserialize(value)
            .map_err(|e| Error::Validation(format!("transaction summary: {}", e)))
    }
}

/// Transaction details payload (line items)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    #[serde(default, deserialize_with = "de::id")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub products: Option<Vec<ProductLine>>,
}

/// A product line inside transaction details
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    #[serde(default, deserialize_with = "de::id")]
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub elastic_id: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub brand: Option<BrandRef>,
    #[serde(default, deserialize_with = "de::text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "de::decimal")]
    pub purchase_quantity: Option<f64>,
    #[serde(default, deserialize_with = "de::decimal")]
    pub purchase_price: Option<f64>,
    #[serde(default, deserialize_with = "de::decimal")]
    pub total_amount: Option<f64>,
}

impl ProductLine {
    /// Catalog id, preferring `productId` over `elasticId`
    pub fn external_id(&self) -> Option<&str> {
        self.product_id.as_deref().or(self.elastic_id.as_deref())
    }
}

/// Brand as it appears on a product line
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BrandRef {
    Details(BrandPayload),
    Name(String),
    /// Anything else carries no usable brand data
    Unrecognized(IgnoredAny),
}

impl BrandRef {
    /// Normalized (external_id, name, own_brand, logo)
    pub fn parts(&self) -> (Option<&str>, Option<&str>, bool, Option<&str>) {
        match self {
            Self::Details(b) => (
                b.id.as_deref(),
                b.name.as_deref(),
                b.own_brand.unwrap_or(false),
                b.logo.as_deref(),
            ),
            Self::Name(name) => {
                let name = name.trim();
                (None, (!name.is_empty()).then_some(name), false, None)
            }
            Self::Unrecognized(_) => (None, None, false, None),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandPayload {
    #[serde(default, deserialize_with = "de::id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub own_brand: Option<bool>,
    #[serde(default, deserialize_with = "de::text")]
    pub logo: Option<String>,
}

/// A product document from the retailer catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    #[serde(default, deserialize_with = "de::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub ean: Option<String>,
    /// Description HTML, usually containing the nutrition label
    #[serde(default, deserialize_with = "de::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::decimal")]
    pub store_price: Option<f64>,
    #[serde(default, deserialize_with = "de::text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "de::id")]
    pub product_internal_code: Option<String>,
}

/// Catalog search response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSearchResponse {
    #[serde(default)]
    pub documents: Vec<CatalogProduct>,
}

// ========== Read models ==========

/// Purchase line as shown with a stored transaction
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseLine {
    pub product_id: i64,
    pub name: String,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub total: Option<f64>,
}

/// A stored transaction with its store and purchase lines
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub store: Option<Store>,
    pub purchases: Vec<PurchaseLine>,
    /// Parsed details blob, if one was stored and is valid JSON
    pub details: Option<Value>,
}

/// Transaction row for listings
#[derive(Debug, Clone, Serialize)]
pub struct TransactionListItem {
    pub transaction_id: String,
    pub transaction_date: Option<NaiveDateTime>,
    pub store_name: Option<String>,
    pub total: Option<f64>,
    pub total_items: Option<i64>,
}

// ========== Reports ==========

/// Windowed spending report
///
/// When the window holds no transactions only `period_days` and `message`
/// are set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpendingReport {
    pub period_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_spent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_per_transaction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_store: Option<Vec<StoreSpending>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_day_of_week: Option<Vec<WeekdaySpending>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_products: Option<Vec<ProductQuantity>>,
}

impl SpendingReport {
    pub fn is_empty(&self) -> bool {
        self.transaction_count.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSpending {
    pub store: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdaySpending {
    /// Full English weekday name ("Monday")
    pub day: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductQuantity {
    pub name: String,
    pub quantity: f64,
}

/// First-vs-last price movement for one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTrend {
    pub product_id: i64,
    pub name: String,
    pub first_seen: Option<NaiveDateTime>,
    pub first_price: f64,
    pub last_seen: Option<NaiveDateTime>,
    pub last_price: f64,
    pub price_change: f64,
    pub percent_change: f64,
    pub total_purchases: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
}

/// Store-wide counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_transactions: i64,
    pub total_products: i64,
    pub date_range: DateRange,
    pub total_spent: f64,
}

/// Outcome of ingesting one transaction
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub transaction: Transaction,
    /// False when the transaction id was already stored
    pub created: bool,
    pub purchases_inserted: usize,
    pub purchases_skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_normalizes_fields() {
        let summary = TransactionSummary::from_value(&json!({
            "transactionId": 987654,
            "transactionDate": "2024-03-09T18:42:05Z",
            "storeId": 42,
            "storeName": "Lisboa Amoreiras",
            "total": "23,45",
            "totalDiscount": 1.5,
            "totalItems": "7"
        }))
        .unwrap();

        assert_eq!(summary.transaction_id.as_deref(), Some("987654"));
        assert_eq!(summary.store_id.as_deref(), Some("42"));
        assert_eq!(summary.total, Some(23.45));
        assert_eq!(summary.total_discount, Some(1.5));
        assert_eq!(summary.total_items, Some(7));
    }

    #[test]
    fn test_summary_rejects_non_object() {
        assert!(matches!(
            TransactionSummary::from_value(&json!([1, 2])),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_product_line_brand_shapes() {
        let line: ProductLine = serde_json::from_value(json!({
            "elasticId": "E1",
            "name": "Iogurte Natural",
            "brand": {"id": 7, "name": "Pingo Doce", "ownBrand": true},
            "purchaseQuantity": "2",
            "purchasePrice": "0,45"
        }))
        .unwrap();
        assert_eq!(line.external_id(), Some("E1"));
        assert_eq!(line.purchase_price, Some(0.45));
        let (id, name, own, _) = line.brand.as_ref().unwrap().parts();
        assert_eq!(id, Some("7"));
        assert_eq!(name, Some("Pingo Doce"));
        assert!(own);

        let line: ProductLine =
            serde_json::from_value(json!({"name": "Pao", "brand": "Padaria"})).unwrap();
        let (id, name, _, _) = line.brand.as_ref().unwrap().parts();
        assert_eq!(id, None);
        assert_eq!(name, Some("Padaria"));

        let line: ProductLine =
            serde_json::from_value(json!({"name": "Pao", "brand": 12})).unwrap();
        assert_eq!(line.brand.as_ref().unwrap().parts().1, None);
    }

    #[test]
    fn test_enrichment_status_round_trip() {
        for status in [
            EnrichmentStatus::Pending,
            EnrichmentStatus::Enriched,
            EnrichmentStatus::Unavailable,
        ] {
            assert_eq!(status.as_str().parse::<EnrichmentStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<EnrichmentStatus>().is_err());
    }
}
