//! Pantry Core Library
//!
//! Shared functionality for the Pantry grocery tracking tool:
//! - Database access, migrations and transaction ingestion
//! - Payload normalization for the retailer API (decimals, dates, brands)
//! - Spending reports, price trends and stats
//! - Nutrition label parsing and catalog enrichment
//! - Diet health scoring from purchase history
//! - Retailer API client
//! - JSON dump import and CSV export

pub mod client;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod export;
pub mod health;
pub mod import;
pub mod models;
pub mod normalize;
pub mod nutrition;
pub mod text;

pub use client::{LatestTransaction, Profile, RetailerClient};
pub use config::Config;
pub use db::{Database, PurchaseInsertResult};
pub use enrich::{CatalogLookup, EnrichmentSummary, MockCatalog, ProductEnricher};
pub use error::{Error, Result};
pub use health::{Category, HealthAnalyzer, HealthReport, HealthScores, Recommendation};
pub use import::{import_json_dump, ImportStats};
pub use nutrition::NutritionFacts;
