//! Health scoring from purchase history
//!
//! Products are classified into ten food categories by keyword. Keywords and
//! product names are both folded (lowercase, no diacritics) before matching,
//! so "GRÃO DE BICO" matches `grao` and `grão` alike. Classification happens
//! in Rust over a per-product purchase rollup; no keyword text reaches SQL.
//!
//! Scores compare each category's share of categorized purchases with a
//! target share:
//!
//! ```text
//! share  = round1(category_count / all_category_counts * 100)
//! score  = round(min(share / target * 100, 100))
//! sweets = 100 - score(sweets, target 3)
//! overall = clamp(50 + sum(round(share_pct * weight)), 0, 100)
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use tracing::debug;

use crate::db::{window_start, Database};
use crate::error::Result;
use crate::normalize::round_to;
use crate::text::fold;

/// Products listed per category
const CATEGORY_PRODUCT_LIMIT: usize = 15;
/// Products listed in the overall ranking
const TOP_PRODUCTS_LIMIT: usize = 25;
/// Products listed per fresh-produce group
const FRESH_PRODUCE_LIMIT: usize = 10;

// Protein sources (plant-based + dairy for vegetarians)
const PROTEIN_KEYWORDS: &[&str] = &[
    "proteic", "protein", "proteín", "proteina", "prot", "tofu", "seitan", "tempeh", "skyr",
    "yopro", "goactive", "quark", "ovo", "ovos", "egg", "eggs",
];

const FERMENTED_KEYWORDS: &[&str] = &[
    "kefir", "kombucha", "kimchi", "chucrute", "sauerkraut", "ferm", "iogurte", "yogurt",
    "yoghurt",
];

const LEGUME_KEYWORDS: &[&str] = &[
    "grao", "grão", "tortitas", "hummus", "humus", "homus", "lentilha", "lentilhas", "feijao",
    "feijão", "tremoco", "tremoço", "tremocos", "fava", "favas", "ervilha", "ervilhas",
    "falafel", "aveia", "aveias", "quinoa", "quinua",
];

// Nuts, seeds and plant omega-3 sources
const NUTS_SEEDS_KEYWORDS: &[&str] = &[
    "chia", "linhaca", "linhaça", "nozes", "noz", "canhamo", "cânhamo", "amendoa", "amêndoa",
    "amendoim", "caju", "cajus", "pistach", "pistacio", "pistachio", "pistáchio", "girassol",
    "sesamo", "sésamo", "sesame", "sementes", "semente",
];

const GREEN_KEYWORDS: &[&str] = &[
    "espinafre", "espinafres", "brocol", "brócolo", "broculos", "bróculos", "brocolos", "couve",
    "couves", "kale", "rucula", "rúcula", "agiao", "agrião", "alface", "alfaces",
];

const VEGETABLE_KEYWORDS: &[&str] = &[
    "pimento", "pimentos", "pimentao", "pimentão", "cenoura", "cenouras", "curgete", "curgetes",
    "curgette", "courgette", "cebola", "cebolas", "tomate", "tomates", "pepino", "pepinos",
    "beringela", "beringelas", "cogumelo", "cogumelos", "aipo", "abobrinha", "salada", "saladas",
    "batata", "batatas", "legumes", "vegetais",
];

const FRUIT_KEYWORDS: &[&str] = &[
    "banana", "bananas", "maca", "maçã", "macas", "maçãs", "laranja", "laranjas", "limao",
    "limão", "limaos", "limões", "kiwi", "kiwis", "manga", "mangas", "pera", "peras", "uva",
    "uvas", "melao", "melão", "melancia", "tangerina", "clementina", "ananas", "ananás",
    "papaia", "mamao", "mamão",
];

// Berries and antioxidant-rich fruits
const BERRY_KEYWORDS: &[&str] = &[
    "mirtilo", "mirtilos", "blueberry", "framboesa", "framboesas", "raspberry", "amora",
    "amoras", "morango", "morangos", "strawberry", "berry", "berries", "silvestres", "groselha",
    "arandos", "acai", "açaí",
];

const HEALTHY_FAT_KEYWORDS: &[&str] = &["guacamole", "abacate", "abacates", "avocado", "azeite"];

// Sweets and processed (to minimize)
const SWEETS_KEYWORDS: &[&str] = &[
    "chocolate", "chocolates", "bombom", "bombons", "bolacha", "bolachas", "gomas", "goma",
    "milka", "kinder", "haribo", "croissant", "donut", "donuts", "wafer", "waffles", "cookie",
    "cookies", "candy",
];

/// Cocoa percentages (dark chocolate) and protein bars are not sweets
const SWEETS_EXCLUSIONS: &[&str] = &["85", "90", "99", "proteic", "protein"];

// Loose produce sold by weight
const FRESH_VEGETABLE_STEMS: &[&str] = &[
    "piment", "cenour", "curgete", "cebola", "tomate", "brocol", "couve", "beringela", "pepino",
    "alho", "cogumelo",
];
const FRESH_FRUIT_STEMS: &[&str] = &[
    "banana", "maçã", "laranja", "limão", "kiwi", "abacate", "manga", "mirtilo",
];

/// Food categories used for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Protein,
    Fermented,
    Legumes,
    NutsSeeds,
    Greens,
    Vegetables,
    Fruits,
    Berries,
    HealthyFats,
    Sweets,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Self::Protein,
        Self::Fermented,
        Self::Legumes,
        Self::NutsSeeds,
        Self::Greens,
        Self::Vegetables,
        Self::Fruits,
        Self::Berries,
        Self::HealthyFats,
        Self::Sweets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Protein => "protein",
            Self::Fermented => "fermented",
            Self::Legumes => "legumes",
            Self::NutsSeeds => "nuts_seeds",
            Self::Greens => "greens",
            Self::Vegetables => "vegetables",
            Self::Fruits => "fruits",
            Self::Berries => "berries",
            Self::HealthyFats => "healthy_fats",
            Self::Sweets => "sweets",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Protein => "Protein Sources",
            Self::Fermented => "Fermented/Probiotic",
            Self::Legumes => "Legumes & Fiber",
            Self::NutsSeeds => "Nuts, Seeds & Omega-3",
            Self::Greens => "Green Leafy Vegetables",
            Self::Vegetables => "Vegetables",
            Self::Fruits => "Fruits",
            Self::Berries => "Berries & Antioxidants",
            Self::HealthyFats => "Healthy Fats",
            Self::Sweets => "Sweets & Processed",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Protein => PROTEIN_KEYWORDS,
            Self::Fermented => FERMENTED_KEYWORDS,
            Self::Legumes => LEGUME_KEYWORDS,
            Self::NutsSeeds => NUTS_SEEDS_KEYWORDS,
            Self::Greens => GREEN_KEYWORDS,
            Self::Vegetables => VEGETABLE_KEYWORDS,
            Self::Fruits => FRUIT_KEYWORDS,
            Self::Berries => BERRY_KEYWORDS,
            Self::HealthyFats => HEALTHY_FAT_KEYWORDS,
            Self::Sweets => SWEETS_KEYWORDS,
        }
    }

    /// Target share of categorized purchases, in percent
    pub fn target(&self) -> f64 {
        match self {
            Self::Protein => 12.0,
            Self::Fermented => 8.0,
            Self::Legumes => 8.0,
            Self::NutsSeeds => 5.0,
            Self::Greens => 5.0,
            Self::Vegetables => 10.0,
            Self::Fruits => 8.0,
            Self::Berries => 3.0,
            Self::HealthyFats => 5.0,
            Self::Sweets => 3.0,
        }
    }

    /// Weight in the overall score (sweets count against it)
    pub fn weight(&self) -> f64 {
        match self {
            Self::Protein => 0.15,
            Self::Fermented => 0.10,
            Self::Legumes => 0.10,
            Self::NutsSeeds => 0.10,
            Self::Greens => 0.10,
            Self::Vegetables => 0.15,
            Self::Fruits => 0.10,
            Self::Berries => 0.05,
            Self::HealthyFats => 0.05,
            Self::Sweets => -0.10,
        }
    }

    /// Whether a product name belongs to this category
    pub fn matches(&self, name: &str) -> bool {
        let folded = fold(name);
        let hit = self.keywords().iter().any(|k| folded.contains(&fold(k)));
        if *self == Self::Sweets {
            hit && !SWEETS_EXCLUSIONS.iter().any(|x| folded.contains(x))
        } else {
            hit
        }
    }
}

/// Purchase rollup for one product within the analysis window
#[derive(Debug, Clone)]
pub(crate) struct ProductRollup {
    pub name: String,
    pub purchase_count: i64,
    pub total_quantity: f64,
    pub total_spent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodInfo {
    /// `None` when the whole history was analyzed
    pub days_analyzed: Option<i64>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub transactions: i64,
    pub unique_products: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub transactions: i64,
    pub total_spent: f64,
    pub unique_products: i64,
    pub total_items: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductFrequency {
    pub name: String,
    pub count: i64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub name: String,
    pub total_purchases: i64,
    pub total_spent: f64,
    pub products: Vec<ProductFrequency>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreshProduce {
    pub vegetables: Vec<ProductFrequency>,
    pub fruits: Vec<ProductFrequency>,
    pub vegetable_variety: usize,
    pub fruit_variety: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthScores {
    pub protein_score: i64,
    pub fermented_score: i64,
    pub legume_score: i64,
    pub nuts_seeds_score: i64,
    pub greens_score: i64,
    pub vegetable_score: i64,
    pub fruit_score: i64,
    pub berry_score: i64,
    pub healthy_fat_score: i64,
    /// Higher is better: fewer sweets
    pub sweets_score: i64,
    pub overall_health_score: i64,
}

impl HealthScores {
    /// Score for a category, as used by the recommendation rules
    pub fn get(&self, category: Category) -> i64 {
        match category {
            Category::Protein => self.protein_score,
            Category::Fermented => self.fermented_score,
            Category::Legumes => self.legume_score,
            Category::NutsSeeds => self.nuts_seeds_score,
            Category::Greens => self.greens_score,
            Category::Vegetables => self.vegetable_score,
            Category::Fruits => self.fruit_score,
            Category::Berries => self.berry_score,
            Category::HealthyFats => self.healthy_fat_score,
            Category::Sweets => self.sweets_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub priority: u8,
    pub category: Category,
    pub issue: String,
    pub action: String,
}

/// Full health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub period: PeriodInfo,
    pub summary: HealthSummary,
    pub categories: Vec<CategorySummary>,
    pub top_products: Vec<ProductFrequency>,
    pub fresh_produce: FreshProduce,
    /// `None` when no purchase fell into any category
    pub health_scores: Option<HealthScores>,
    pub recommendations: Vec<Recommendation>,
}

impl HealthReport {
    pub fn category(&self, category: Category) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == category)
    }
}

struct Rule {
    priority: u8,
    category: Category,
    threshold: i64,
    issue: &'static str,
    action: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        priority: 1,
        category: Category::NutsSeeds,
        threshold: 50,
        issue: "Low nuts/seeds intake (omega-3 source)",
        action: "Increase: linhaca, chia, nozes, sementes de canhamo, amendoas. Consider algae EPA/DHA supplement.",
    },
    Rule {
        priority: 2,
        category: Category::Greens,
        threshold: 50,
        issue: "Low green leafy vegetable intake",
        action: "Add couve kale, espinafres, rucula, broculos to weekly shopping.",
    },
    Rule {
        priority: 3,
        category: Category::Vegetables,
        threshold: 50,
        issue: "Low vegetable variety",
        action: "Add more: pimento, cenoura, curgete, tomate, cogumelos.",
    },
    Rule {
        priority: 4,
        category: Category::Berries,
        threshold: 50,
        issue: "Low berry/antioxidant intake",
        action: "Add mirtilos, framboesas (frozen ok) 2-3x per week.",
    },
    Rule {
        priority: 5,
        category: Category::Sweets,
        threshold: 70,
        issue: "High processed sweets intake",
        action: "Replace with 85%+ dark chocolate, fruit, or protein bars.",
    },
];

/// Share-vs-target score for one category, capped at 100
pub fn score_percentage(value: i64, total: i64, target: f64) -> i64 {
    if total == 0 {
        return 0;
    }
    let actual = round_to(value as f64 / total as f64 * 100.0, 1);
    (actual / target * 100.0).min(100.0).round() as i64
}

/// Weighted composite starting at 50, clamped to 0..=100
pub fn overall_score(counts: &[(Category, i64)], total: i64) -> i64 {
    if total == 0 {
        return 50;
    }
    let adjustment: i64 = counts
        .iter()
        .map(|(category, count)| {
            let pct = *count as f64 / total as f64 * 100.0;
            (pct * category.weight()).round() as i64
        })
        .sum();
    (50 + adjustment).clamp(0, 100)
}

/// Compute scores from per-category purchase counts
///
/// Returns `None` when no purchase matched any category.
pub fn calculate_scores(counts: &[(Category, i64)]) -> Option<HealthScores> {
    let total: i64 = counts.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return None;
    }

    let count = |category: Category| {
        counts
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };
    let score = |category: Category| score_percentage(count(category), total, category.target());

    Some(HealthScores {
        protein_score: score(Category::Protein),
        fermented_score: score(Category::Fermented),
        legume_score: score(Category::Legumes),
        nuts_seeds_score: score(Category::NutsSeeds),
        greens_score: score(Category::Greens),
        vegetable_score: score(Category::Vegetables),
        fruit_score: score(Category::Fruits),
        berry_score: score(Category::Berries),
        healthy_fat_score: score(Category::HealthyFats),
        sweets_score: 100 - score(Category::Sweets),
        overall_health_score: overall_score(counts, total),
    })
}

/// Recommendations for every score below its rule threshold, by priority
pub fn recommendations(scores: Option<&HealthScores>) -> Vec<Recommendation> {
    let Some(scores) = scores else {
        return Vec::new();
    };

    RULES
        .iter()
        .filter(|rule| scores.get(rule.category) < rule.threshold)
        .map(|rule| Recommendation {
            priority: rule.priority,
            category: rule.category,
            issue: rule.issue.to_string(),
            action: rule.action.to_string(),
        })
        .collect()
}

fn rank(mut items: Vec<ProductFrequency>, limit: usize) -> Vec<ProductFrequency> {
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    items.truncate(limit);
    items
}

fn frequency(rollup: &ProductRollup) -> ProductFrequency {
    ProductFrequency {
        name: rollup.name.clone(),
        count: rollup.purchase_count,
        quantity: round_to(rollup.total_quantity, 1),
    }
}

fn summarize_category(category: Category, rollups: &[ProductRollup]) -> CategorySummary {
    let matched: Vec<&ProductRollup> = rollups.iter().filter(|r| category.matches(&r.name)).collect();

    CategorySummary {
        category,
        name: category.label().to_string(),
        total_purchases: matched.iter().map(|r| r.purchase_count).sum(),
        total_spent: round_to(matched.iter().map(|r| r.total_spent).sum(), 2),
        products: rank(
            matched.iter().map(|r| frequency(r)).collect(),
            CATEGORY_PRODUCT_LIMIT,
        ),
    }
}

fn fresh_produce(rollups: &[ProductRollup], stems: &[&str]) -> Vec<ProductFrequency> {
    let loose: Vec<ProductFrequency> = rollups
        .iter()
        .filter(|r| {
            let folded = fold(&r.name);
            folded.contains("kg") && stems.iter().any(|s| folded.contains(&fold(s)))
        })
        .map(|r| ProductFrequency {
            name: r.name.clone(),
            count: r.purchase_count,
            quantity: round_to(r.total_quantity, 1),
        })
        .collect();
    rank(loose, FRESH_PRODUCE_LIMIT)
}

/// Builds health reports over an optional trailing window of days
pub struct HealthAnalyzer<'a> {
    db: &'a Database,
    days: Option<i64>,
    today: NaiveDate,
}

impl<'a> HealthAnalyzer<'a> {
    pub fn new(db: &'a Database, days: Option<i64>) -> Self {
        Self {
            db,
            days,
            today: Local::now().date_naive(),
        }
    }

    /// Anchor the window at a fixed date instead of today
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn window_start(&self) -> Result<Option<String>> {
        self.days
            .map(|d| window_start(self.today, d).map(|start| start.to_string()))
            .transpose()
    }

    pub fn generate(&self) -> Result<HealthReport> {
        let since = self.window_start()?;
        let rollups = self.db.purchase_rollup(since.as_deref())?;
        debug!(products = rollups.len(), "Classifying products");

        let categories: Vec<CategorySummary> = Category::ALL
            .iter()
            .map(|c| summarize_category(*c, &rollups))
            .collect();
        let counts: Vec<(Category, i64)> = categories
            .iter()
            .map(|c| (c.category, c.total_purchases))
            .collect();

        let health_scores = calculate_scores(&counts);
        let recommendations = recommendations(health_scores.as_ref());

        let vegetables = fresh_produce(&rollups, FRESH_VEGETABLE_STEMS);
        let fruits = fresh_produce(&rollups, FRESH_FRUIT_STEMS);

        Ok(HealthReport {
            generated_at: Utc::now(),
            period: self.db.health_period(since.as_deref(), self.days)?,
            summary: self.db.health_summary(since.as_deref())?,
            categories,
            top_products: rank(rollups.iter().map(frequency).collect(), TOP_PRODUCTS_LIMIT),
            fresh_produce: FreshProduce {
                vegetable_variety: vegetables.len(),
                fruit_variety: fruits.len(),
                vegetables,
                fruits,
            },
            health_scores,
            recommendations,
        })
    }
}

impl Database {
    /// Per-product purchase counts, quantities and spend since a date
    pub(crate) fn purchase_rollup(&self, since: Option<&str>) -> Result<Vec<ProductRollup>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.name, COUNT(*), COALESCE(SUM(pu.quantity), 0), COALESCE(SUM(pu.total), 0)
             FROM purchases pu
             JOIN products p ON p.id = pu.product_id
             WHERE (?1 IS NULL OR date(pu.purchase_date) >= ?1)
             GROUP BY p.id",
        )?;
        let rollups = stmt
            .query_map(params![since], |row| {
                Ok(ProductRollup {
                    name: row.get(0)?,
                    purchase_count: row.get(1)?,
                    total_quantity: row.get(2)?,
                    total_spent: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rollups)
    }

    fn health_period(&self, since: Option<&str>, days: Option<i64>) -> Result<PeriodInfo> {
        let conn = self.conn()?;
        let period = conn.query_row(
            "SELECT MIN(purchase_date), MAX(purchase_date),
                    COUNT(DISTINCT transaction_id), COUNT(DISTINCT product_id)
             FROM purchases pu
             WHERE (?1 IS NULL OR date(pu.purchase_date) >= ?1)",
            params![since],
            |row| {
                Ok(PeriodInfo {
                    days_analyzed: days,
                    start_date: crate::db::parse_stored_date(row.get(0)?),
                    end_date: crate::db::parse_stored_date(row.get(1)?),
                    transactions: row.get(2)?,
                    unique_products: row.get(3)?,
                })
            },
        )?;
        Ok(period)
    }

    fn health_summary(&self, since: Option<&str>) -> Result<HealthSummary> {
        let conn = self.conn()?;

        // Spend is summed once per transaction, not once per purchase line
        let (transactions, total_spent): (i64, f64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(t.total), 0)
             FROM transactions t
             WHERE t.id IN (
                 SELECT pu.transaction_id FROM purchases pu
                 WHERE (?1 IS NULL OR date(pu.purchase_date) >= ?1)
             )",
            params![since],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (unique_products, total_items): (i64, f64) = conn.query_row(
            "SELECT COUNT(DISTINCT product_id), COALESCE(SUM(quantity), 0)
             FROM purchases pu
             WHERE (?1 IS NULL OR date(pu.purchase_date) >= ?1)",
            params![since],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(HealthSummary {
            transactions,
            total_spent: round_to(total_spent, 2),
            unique_products,
            total_items: total_items.round(),
        })
    }
}
