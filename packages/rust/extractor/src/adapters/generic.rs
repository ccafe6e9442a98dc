//! Generic (fallback) recipe adapter.
//!
//! Always matches. Looks for h-recipe microformat classes and the class
//! names most recipe templates use for the same regions.

use std::sync::LazyLock;

use recipefinder_shared::Ingredient;
use scraper::{ElementRef, Html, Selector};

use super::{SiteAdapter, ingredient_row};
use crate::{normalize_text, strip_step_marker};

static TITLE: LazyLock<Selector> = LazyLock::new(|| sel(".p-name, .recipe-title, h1"));
static INGREDIENT: LazyLock<Selector> = LazyLock::new(|| sel(".p-ingredient, .ingredient"));
static NAME: LazyLock<Selector> = LazyLock::new(|| sel(".name, .ingredient-name"));
static QUANTITY: LazyLock<Selector> =
    LazyLock::new(|| sel(".quantity, .amount, .ingredient-quantity"));
static STEP: LazyLock<Selector> =
    LazyLock::new(|| sel(".e-instructions li, .instructions li, .step"));

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

/// Fallback adapter for pages without a known site layout.
pub struct GenericAdapter;

impl SiteAdapter for GenericAdapter {
    fn detect(&self, _doc: &Html) -> bool {
        true
    }

    fn title(&self, doc: &Html) -> Option<String> {
        doc.select(&TITLE)
            .map(|el| normalize_text(&text_of(el)))
            .find(|t| !t.is_empty())
    }

    fn ingredients(&self, doc: &Html) -> Option<Vec<Ingredient>> {
        let rows: Vec<ElementRef> = doc.select(&INGREDIENT).collect();
        if rows.is_empty() {
            return None;
        }

        Some(
            rows.into_iter()
                .filter_map(|row| {
                    let name = row.select(&NAME).next().map(text_of);
                    let quantity = row.select(&QUANTITY).next().map(text_of);
                    ingredient_row(name, quantity)
                })
                .collect(),
        )
    }

    fn steps(&self, doc: &Html) -> Option<Vec<String>> {
        let blocks: Vec<ElementRef> = doc.select(&STEP).collect();
        if blocks.is_empty() {
            return None;
        }

        Some(
            blocks
                .into_iter()
                .map(|block| strip_step_marker(&normalize_text(&text_of(block))))
                .filter(|text| !text.is_empty())
                .collect(),
        )
    }

    fn name(&self) -> &str {
        "generic"
    }
}

fn text_of(el: ElementRef) -> String {
    el.text().collect()
}
