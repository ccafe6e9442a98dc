//! Xiachufang (xiachufang.com) recipe page adapter.

use std::sync::LazyLock;

use recipefinder_shared::Ingredient;
use scraper::{ElementRef, Html, Selector};

use super::{SiteAdapter, ingredient_row};
use crate::{normalize_text, strip_step_marker};

static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("h1.page-title"));
static INGS: LazyLock<Selector> = LazyLock::new(|| sel("div.ings"));
static ROW: LazyLock<Selector> = LazyLock::new(|| sel("tr"));
static NAME: LazyLock<Selector> = LazyLock::new(|| sel("td.name"));
static UNIT: LazyLock<Selector> = LazyLock::new(|| sel("td.unit"));
static STEPS: LazyLock<Selector> = LazyLock::new(|| sel("div.steps"));
static STEP_ITEM: LazyLock<Selector> = LazyLock::new(|| sel("li"));
static STEP_TEXT: LazyLock<Selector> = LazyLock::new(|| sel("p.text"));

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

/// Extracts recipes from xiachufang detail pages.
pub struct XiachufangAdapter;

impl SiteAdapter for XiachufangAdapter {
    fn detect(&self, doc: &Html) -> bool {
        doc.select(&INGS).next().is_some() || doc.select(&STEPS).next().is_some()
    }

    fn title(&self, doc: &Html) -> Option<String> {
        doc.select(&TITLE)
            .next()
            .map(|el| normalize_text(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    fn ingredients(&self, doc: &Html) -> Option<Vec<Ingredient>> {
        let region = doc.select(&INGS).next()?;

        let rows = region
            .select(&ROW)
            .filter_map(|row| {
                let name = row.select(&NAME).next().map(text_of);
                let unit = row.select(&UNIT).next().map(text_of);
                ingredient_row(name, unit)
            })
            .collect();

        Some(rows)
    }

    fn steps(&self, doc: &Html) -> Option<Vec<String>> {
        let region = doc.select(&STEPS).next()?;

        let steps = region
            .select(&STEP_ITEM)
            .map(|item| {
                item.select(&STEP_TEXT)
                    .next()
                    .map(text_of)
                    .unwrap_or_else(|| text_of(item))
            })
            .map(|text| strip_step_marker(&normalize_text(&text)))
            .filter(|text| !text.is_empty())
            .collect();

        Some(steps)
    }

    fn name(&self) -> &str {
        "xiachufang"
    }
}

fn text_of(el: ElementRef) -> String {
    el.text().collect()
}
