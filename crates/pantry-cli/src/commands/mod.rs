//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database commands (init, stats, import, export) and shared utilities (open_db)
//! - `enrich` - Catalog enrichment command
//! - `reports` - Spending report, price trends and health analysis
//! - `sync` - Retailer API commands (fetch, transactions, sync)

pub mod core;
pub mod enrich;
pub mod reports;
pub mod sync;

// Re-export command functions for main.rs
pub use core::*;
pub use enrich::*;
pub use reports::*;
pub use sync::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an optional amount as euros
pub fn euros(amount: Option<f64>) -> String {
    match amount {
        Some(a) => format!("{:.2} EUR", a),
        None => "N/A".to_string(),
    }
}
