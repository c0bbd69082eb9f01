//! Error types for Pantry

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A required payload field is missing or malformed
    #[error("Invalid payload: {0}")]
    Validation(String),

    /// A uniqueness constraint fired that find-or-create could not resolve
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// An ingestion unit failed and was rolled back
    #[error("Failed to save transaction {transaction_id}: {source}")]
    Storage {
        transaction_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not authenticated. Call login first.")]
    NotAuthenticated,

    #[error("API error: {0}")]
    Api(String),
}

impl Error {
    /// Wrap a failure that happened inside an ingestion unit
    pub(crate) fn storage(transaction_id: &str, source: Error) -> Self {
        Self::Storage {
            transaction_id: transaction_id.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
