//! Report command implementations

use anyhow::Result;
use pantry_core::db::Database;
use pantry_core::health::{HealthAnalyzer, HealthReport};

use super::truncate;

pub fn cmd_report(db: &Database, days: i64, json: bool) -> Result<()> {
    let report = db.spending_report(days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(message) = &report.message {
        println!("{}", message);
        return Ok(());
    }

    println!();
    println!("📊 Spending Report (last {} days)", report.period_days);
    println!("   ─────────────────────────────────────────────");
    println!("   Total spent:  {:.2} EUR", report.total_spent.unwrap_or(0.0));
    println!("   Transactions: {}", report.transaction_count.unwrap_or(0));
    println!(
        "   Average:      {:.2} EUR",
        report.average_per_transaction.unwrap_or(0.0)
    );

    if let Some(by_store) = &report.by_store {
        println!();
        println!("🏪 By Store");
        for s in by_store {
            println!("   {:35} {:>10.2} EUR", truncate(&s.store, 35), s.amount);
        }
    }

    if let Some(by_day) = &report.by_day_of_week {
        println!();
        println!("📅 By Day of Week");
        for d in by_day {
            println!("   {:35} {:>10.2} EUR", d.day, d.amount);
        }
    }

    if let Some(top) = report.top_products.as_ref().filter(|t| !t.is_empty()) {
        println!();
        println!("🛒 Top Products");
        for (i, p) in top.iter().enumerate() {
            println!("   {:>2}. {} ({}x)", i + 1, truncate(&p.name, 40), p.quantity);
        }
    }

    Ok(())
}

pub fn cmd_prices(db: &Database, product: Option<&str>, json: bool) -> Result<()> {
    let trends = db.price_trends(product)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&trends)?);
        return Ok(());
    }

    if trends.is_empty() {
        println!("No products with multiple purchases found for price analysis");
        return Ok(());
    }

    println!();
    println!("📈 Product Price Trends");
    println!("   ─────────────────────────────────────────────");

    let date = |d: Option<chrono::NaiveDateTime>| {
        d.map(|d| d.date().to_string())
            .unwrap_or_else(|| "N/A".to_string())
    };

    for trend in &trends {
        let sign = if trend.price_change >= 0.0 { "+" } else { "" };
        println!();
        println!("   {}", trend.name);
        println!(
            "      First: {} at {:.2} EUR",
            date(trend.first_seen),
            trend.first_price
        );
        println!(
            "      Last:  {} at {:.2} EUR",
            date(trend.last_seen),
            trend.last_price
        );
        println!(
            "      Change: {}{:.2} EUR ({}{:.1}%)",
            sign, trend.price_change, sign, trend.percent_change
        );
        println!("      Total purchases: {}", trend.total_purchases);
    }

    Ok(())
}

pub fn cmd_health(db: &Database, days: Option<i64>, json: bool) -> Result<()> {
    let report = HealthAnalyzer::new(db, days).generate()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_health_report(&report);
    Ok(())
}

fn print_health_report(report: &HealthReport) {
    println!();
    match report.period.days_analyzed {
        Some(days) => println!("🥗 Diet Health Report (last {} days)", days),
        None => println!("🥗 Diet Health Report (all history)"),
    }
    println!("   ─────────────────────────────────────────────");
    println!("   Transactions:    {}", report.summary.transactions);
    println!("   Unique products: {}", report.summary.unique_products);
    println!("   Total spent:     {:.2} EUR", report.summary.total_spent);

    let Some(scores) = &report.health_scores else {
        println!();
        println!("No categorized purchases found. Sync or import some transactions first.");
        return;
    };

    println!();
    println!("📋 Scores (0-100)");
    println!("   Overall:      {:>3}", scores.overall_health_score);
    for category in &report.categories {
        println!(
            "   {:13} {:>3}  ({} purchases, {:.2} EUR)",
            format!("{}:", category.name),
            scores.get(category.category),
            category.total_purchases,
            category.total_spent
        );
    }

    println!();
    println!(
        "🥦 Fresh produce variety: {} vegetables, {} fruits",
        report.fresh_produce.vegetable_variety, report.fresh_produce.fruit_variety
    );

    if !report.top_products.is_empty() {
        println!();
        println!("🛒 Most Purchased");
        for (i, p) in report.top_products.iter().take(10).enumerate() {
            println!("   {:>2}. {} ({}x)", i + 1, truncate(&p.name, 40), p.count);
        }
    }

    if !report.recommendations.is_empty() {
        println!();
        println!("💡 Recommendations");
        for r in &report.recommendations {
            println!("   {}. {}", r.priority, r.issue);
            println!("      {}", r.action);
        }
    }
}
