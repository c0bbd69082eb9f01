//! Nutrition label extraction from product description HTML
//!
//! Product descriptions from the retailer catalog carry a Portuguese
//! nutrition table as loosely formatted HTML ("Energia: 435 kj / 103 kcal<br>
//! Lípidos: 2,5 g ..."). This module turns that blob into typed values using
//! a fixed set of label patterns. It never fails: anything it cannot read
//! comes back as `None`.

use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::normalize::parse_decimal_str;
use crate::text::collapse_whitespace;

/// Values per 100g/100ml as printed on the label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub energy_kj: Option<f64>,
    pub energy_kcal: Option<f64>,
    pub fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugars: Option<f64>,
    pub fiber: Option<f64>,
    pub protein: Option<f64>,
    pub salt: Option<f64>,
    pub ingredients: Option<String>,
}

impl NutritionFacts {
    /// Whether the label yielded enough to be worth persisting
    pub fn has_core_values(&self) -> bool {
        self.energy_kcal.is_some() || self.protein.is_some()
    }
}

fn br_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("invalid br regex"))
}

fn energy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Energia:\s*([\d,.]+)\s*kj\s*/\s*([\d,.]+)\s*kcal")
            .expect("invalid energy regex")
    })
}

fn fat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)L[ií]pidos:\s*([\d,.]+)\s*g").expect("invalid fat regex"))
}

fn saturated_fat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:Dos quais )?saturados:\s*([\d,.]+)\s*g")
            .expect("invalid saturated fat regex")
    })
}

fn carbohydrates_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Hidratos de carbono:\s*([\d,.]+)\s*g")
            .expect("invalid carbohydrates regex")
    })
}

fn sugars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:Dos quais )?a[çc][úu]cares:\s*([\d,.]+)\s*g")
            .expect("invalid sugars regex")
    })
}

fn fiber_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Fibras?:\s*([\d,.]+)\s*g").expect("invalid fiber regex"))
}

fn protein_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Prote[ií]nas?:\s*([\d,.]+)\s*g").expect("invalid protein regex")
    })
}

fn salt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Sal:\s*([\d,.]+)\s*g").expect("invalid salt regex"))
}

fn ingredients_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)Ingredientes[:\s]*(.*?)(?:\z|Alerg|Conservar|Pode conter)")
            .expect("invalid ingredients regex")
    })
}

/// Parse a nutrition label. Empty or missing input yields all-`None`.
pub fn parse(html: Option<&str>) -> NutritionFacts {
    let Some(html) = html.filter(|h| !h.is_empty()) else {
        return NutritionFacts::default();
    };

    let text = html_to_text(html);
    let energy = energy_re().captures(&text);

    NutritionFacts {
        energy_kj: energy
            .as_ref()
            .and_then(|c| c.get(1))
            .and_then(|m| parse_decimal_str(m.as_str())),
        energy_kcal: energy
            .as_ref()
            .and_then(|c| c.get(2))
            .and_then(|m| parse_decimal_str(m.as_str())),
        fat: extract_value(&text, fat_re()),
        saturated_fat: extract_value(&text, saturated_fat_re()),
        carbohydrates: extract_value(&text, carbohydrates_re()),
        sugars: extract_value(&text, sugars_re()),
        fiber: extract_value(&text, fiber_re()),
        protein: extract_value(&text, protein_re()),
        salt: extract_value(&text, salt_re()),
        ingredients: ingredients_from_text(&text),
    }
}

/// Quick check for a nutrition section before running the full parse
pub fn has_nutrition_data(html: Option<&str>) -> bool {
    let Some(html) = html.filter(|h| !h.is_empty()) else {
        return false;
    };

    let text = html_to_text(html);
    text.contains("Nutri") || text.contains("Energia") || text.contains("kcal")
}

/// Extract only the ingredients list from a description blob
pub fn extract_ingredients(html: &str) -> Option<String> {
    if html.is_empty() {
        return None;
    }
    ingredients_from_text(&html_to_text(html))
}

/// Line breaks become newlines, every other tag becomes a separator,
/// entities are decoded and whitespace collapsed.
fn html_to_text(html: &str) -> String {
    let with_breaks = br_re().replace_all(html, "\n");
    let fragment = Html::parse_fragment(&with_breaks);
    let joined = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&joined)
}

fn extract_value(text: &str, re: &Regex) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_decimal_str(m.as_str()))
}

fn ingredients_from_text(text: &str) -> Option<String> {
    let captured = ingredients_re().captures(text)?.get(1)?.as_str();
    let collapsed = collapse_whitespace(captured);
    let trimmed = collapsed.trim_end_matches('.').trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
